use path_absolutize::Absolutize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::LoadError;

/// `--routes` に渡されたパスを、読み込むルート定義ファイルの一覧に解決する。
///
/// - ファイルならそれ自体
/// - ディレクトリなら配下の `*.json` をファイル名順に再帰探索
///
/// 戻り値のパスはすべて絶対パス。
pub fn collect_route_files(input: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let abs = input
        .absolutize()
        .map_err(|source| LoadError::Io {
            path: input.to_path_buf(),
            source,
        })?
        .to_path_buf();

    if abs.is_file() {
        return Ok(vec![abs]);
    }
    if !abs.is_dir() {
        return Err(LoadError::NotFound(abs));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&abs).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(LoadError::NoRouteFiles(abs));
    }
    debug!(dir = %abs.display(), files = files.len(), "ルート定義ファイルを収集");
    Ok(files)
}

/// 各ファイルのルート定義 (配列、または単一オブジェクト) をファイル順に連結する
pub fn load_route_descriptors(files: &[PathBuf]) -> Result<Vec<Value>, LoadError> {
    let mut routes = Vec::new();
    for path in files {
        let src = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&src).map_err(|source| LoadError::Json {
            path: path.clone(),
            source,
        })?;
        match value {
            Value::Array(items) => routes.extend(items),
            obj @ Value::Object(_) => routes.push(obj),
            _ => return Err(LoadError::NotRoutes(path.clone())),
        }
    }
    Ok(routes)
}
