// src/error.rs
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// ルートのコンパイルに失敗した理由
#[derive(Debug, Error)]
pub enum CompileError {
    /// ルート定義の形が壊れている。1 件でもあればコンパイル全体を中断する
    #[error("Invalid route config (path must be a string and component is required)\n{serialized}")]
    Structural {
        /// 問題のあったルート定義の JSON 表現
        serialized: String,
    },
}

impl CompileError {
    pub(crate) fn structural(value: &Value) -> Self {
        CompileError::Structural {
            serialized: value.to_string(),
        }
    }
}

/// 生成したソースの検査エラー
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unexpected shape: {0}")]
    Shape(String),
}

/// ルート定義ファイルの読み込みエラー
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("no such file or directory: {0}")]
    NotFound(PathBuf),

    #[error("no route definition files (*.json) found under {0}")]
    NoRouteFiles(PathBuf),

    #[error("{0} must contain a route object or an array of route objects")]
    NotRoutes(PathBuf),
}
