// src/render.rs
//! 生成コードに埋め込む文字列リテラルと、バンドラ向けの副出力の描画

use crate::compiler::{Registry, RouteChunkNames};

/// シングルクォートの JavaScript 文字列リテラルにする
pub fn js_single_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// ダブルクォートの文字列リテラル (JSON 文字列は JavaScript としても有効)
pub fn js_double_quoted(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// チャンク名を埋め込んだ遅延 import 式
pub fn loader_expression(chunk_name: &str, module_path: &str) -> String {
    // コメントを途中で閉じさせない
    let name = js_single_quoted(chunk_name).replace("*/", "*\\/");
    format!(
        "() => import(/* webpackChunkName: {name} */ {})",
        js_double_quoted(module_path)
    )
}

/// レジストリを `export default { 'chunk': [loader, "modulePath"], ... };` 形式の
/// ES モジュールとして描画する
pub fn render_registry_module(registry: &Registry) -> String {
    let entries: Vec<String> = registry
        .iter()
        .map(|(chunk_name, entry)| {
            format!(
                "  {}: [{}, {}],",
                js_single_quoted(chunk_name),
                entry.loader_expression,
                js_double_quoted(&entry.module_path)
            )
        })
        .collect();
    format!("export default {{\n{}\n}};\n", entries.join("\n"))
}

pub fn render_chunk_names(names: &RouteChunkNames) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(names)
}
