// src/chunk.rs
use heck::ToKebabCase;
use sha2::{Digest, Sha256};

/// チャンク名の生成方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkNaming {
    /// `component---blog-js1a2-3b4` のような人が読める名前 (開発ビルド向け)
    #[default]
    Descriptive,
    /// 8 桁の 16 進ハッシュのみ (本番ビルド向け)
    Short,
}

/// モジュールパスと、文脈 (prefix / 名前ヒント) からチャンク名を生成する。
///
/// 同じ入力からは常に同じ名前が得られる。
/// 同じモジュールでも prefix や名前ヒントが違えば別の名前になりうる。
pub fn chunk_name(
    naming: ChunkNaming,
    module_path: &str,
    prefix: Option<&str>,
    preferred_name: Option<&str>,
) -> String {
    match naming {
        // フィールド同士の連結が曖昧にならないよう NUL で区切る
        ChunkNaming::Short => short_hash(
            &format!(
                "{module_path}\0{}\0{}",
                prefix.unwrap_or_default(),
                preferred_name.unwrap_or_default()
            ),
            8,
        ),
        ChunkNaming::Descriptive => {
            let source = match preferred_name {
                Some(name) => format!("{name}{}", short_hash(module_path, 3)),
                None => module_path.to_owned(),
            };
            let name = doc_hash(&source);
            match prefix {
                Some(prefix) if !prefix.is_empty() => format!("{prefix}---{name}"),
                _ => name,
            }
        }
    }
}

/// 文字列をケバブケースにし、衝突回避のため短いハッシュを付ける。`/` は `index`。
pub fn doc_hash(source: &str) -> String {
    if source == "/" {
        return "index".to_owned();
    }
    format!("{}-{}", source.to_kebab_case(), short_hash(source, 3))
}

/// SHA-256 の 16 進表現の先頭 `len` 文字
pub fn short_hash(source: &str, len: usize) -> String {
    let mut digest = hex::encode(Sha256::digest(source.as_bytes()));
    digest.truncate(len);
    digest
}
