// src/model.rs
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::CompileError;

/// `encodeURIComponent` と同じく、英数字と `-_.!~*'()` 以外をエスケープする
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// プラグイン層から渡される 1 件のルート定義
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    /// ルートのパス (例: "/blog", "/docs/:id")
    pub path: String,

    /// ルートを描画するコンポーネント (通常は `ModuleTree::Leaf`)
    pub component: ModuleTree,

    /// ルートが依存するデータモジュール群 (任意の入れ子)
    pub modules: ModuleTree,

    /// 子ルート。`Some` なら (空配列であっても) 内部ノード扱い
    pub routes: Option<Vec<RouteDescriptor>>,

    pub exact: bool,
}

impl RouteDescriptor {
    /// JSON 値からルート定義を構築する。
    ///
    /// `path` が文字列でない場合、または `component` が欠けている場合は
    /// 元の JSON を添えた `CompileError::Structural` を返す。
    /// 親を検査してから子へ降りるので、最初に見つかった不正なルートが報告される。
    pub fn from_value(value: &Value) -> Result<Self, CompileError> {
        let Some(obj) = value.as_object() else {
            return Err(CompileError::structural(value));
        };

        let path = match obj.get("path") {
            Some(Value::String(path)) => path.clone(),
            _ => return Err(CompileError::structural(value)),
        };

        let component = match obj.get("component") {
            Some(raw) if is_truthy(raw) => ModuleTree::classify(raw),
            _ => return Err(CompileError::structural(value)),
        };

        let modules = obj
            .get("modules")
            .map(ModuleTree::classify)
            .unwrap_or(ModuleTree::Empty);

        let routes = match obj.get("routes") {
            None => None,
            Some(raw) if !is_truthy(raw) => None,
            Some(Value::Array(children)) => Some(
                children
                    .iter()
                    .map(RouteDescriptor::from_value)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => return Err(CompileError::structural(value)),
        };

        let exact = obj.get("exact").is_some_and(is_truthy);

        Ok(RouteDescriptor {
            path,
            component,
            modules,
            routes,
            exact,
        })
    }

    /// 子ルートを持たない (静的レンダリング可能な) ルートかどうか
    pub fn is_leaf(&self) -> bool {
        self.routes.is_none()
    }
}

/// 遅延ロードされるコード単位への参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// `"./Blog.js"` のような素のインポートパス
    Bare(String),

    /// `{ "__import": ..., "path": ..., "query": {...} }` 形式の参照
    Structured {
        /// `__import` マーカーが文字列ならその値
        import_specifier: Option<String>,
        path: String,
        /// キー順に並んだクエリ。配列値は同じキーの繰り返しとして出力する
        query: BTreeMap<String, Vec<String>>,
    },
}

impl ModuleRef {
    /// チャンク名とローダーに使うモジュールパスを返す
    ///
    /// 構造化参照でクエリがあれば `path?key=value&...` になる。
    pub fn module_path(&self) -> String {
        match self {
            ModuleRef::Bare(path) => path.clone(),
            ModuleRef::Structured { path, query, .. } => {
                let query_str = query_string(query);
                if query_str.is_empty() {
                    path.clone()
                } else {
                    format!("{path}?{query_str}")
                }
            }
        }
    }
}

fn query_string(query: &BTreeMap<String, Vec<String>>) -> String {
    let mut pairs = Vec::new();
    for (key, values) in query {
        let key = utf8_percent_encode(key, QUERY_COMPONENT).to_string();
        for value in values {
            pairs.push(format!(
                "{key}={}",
                utf8_percent_encode(value, QUERY_COMPONENT)
            ));
        }
    }
    pairs.join("&")
}

/// `modules` フィールドなどに現れる、任意の深さのモジュール参照ツリー
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModuleTree {
    Leaf(ModuleRef),
    Sequence(Vec<ModuleTree>),
    /// 入力のキー順を保持する
    Named(IndexMap<String, ModuleTree>),
    /// null・数値・真偽値・空文字列など、チャンクを持たない値
    #[default]
    Empty,
}

impl ModuleTree {
    /// 型の無い JSON 値をツリーのどれか 1 つの形に分類する
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(path) if !path.is_empty() => ModuleTree::Leaf(ModuleRef::Bare(path.clone())),
            Value::Array(items) => ModuleTree::Sequence(items.iter().map(ModuleTree::classify).collect()),
            Value::Object(obj) => match (obj.get("__import"), obj.get("path")) {
                (Some(marker), Some(Value::String(path))) => ModuleTree::Leaf(ModuleRef::Structured {
                    import_specifier: marker.as_str().map(str::to_owned),
                    path: path.clone(),
                    query: obj.get("query").map(classify_query).unwrap_or_default(),
                }),
                _ => ModuleTree::Named(
                    obj.iter()
                        .map(|(key, child)| (key.clone(), ModuleTree::classify(child)))
                        .collect(),
                ),
            },
            _ => ModuleTree::Empty,
        }
    }

    /// 葉なら、そのモジュールパスを名前のヒントとして返す
    pub fn name_hint(&self) -> Option<String> {
        match self {
            ModuleTree::Leaf(module) => Some(module.module_path()),
            _ => None,
        }
    }
}

fn classify_query(value: &Value) -> BTreeMap<String, Vec<String>> {
    let Some(obj) = value.as_object() else {
        return BTreeMap::new();
    };
    obj.iter()
        .map(|(key, raw)| {
            let values = match raw {
                Value::Array(items) => items.iter().map(query_scalar).collect(),
                other => vec![query_scalar(other)],
            };
            (key.clone(), values)
        })
        .collect()
}

/// Node の querystring と同様、文字列・数値・真偽値以外は空文字列にする
fn query_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// JavaScript の真偽値変換と同じ判定
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
