// src/compiler.rs
//! ルート定義のツリーを、ルーター用の生成コードとチャンクのレジストリへ変換する。
//!
//! 1 回の再帰下降で、コード文字列と 3 つの付随データ (レジストリ・ルートごとの
//! チャンク名・静的パス一覧) を同時に組み立てる。状態はすべて `compile` 呼び出しの
//! 中だけで完結し、呼び出しをまたいで残るものはない。

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, trace, warn};

use crate::chunk::{ChunkNaming, chunk_name};
use crate::error::CompileError;
use crate::model::{ModuleTree, RouteDescriptor};
use crate::render::{js_single_quoted, loader_expression};

/// 静的パス一覧の先頭に必ず入る 404 ページ
pub const NOT_FOUND_PATH: &str = "404.html";

/// チャンク名 → ローダー
pub type Registry = BTreeMap<String, ChunkRegistryEntry>;

/// ルートパス → そのルートが使うチャンク名のツリー
pub type RouteChunkNames = IndexMap<String, RouteChunks>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRegistryEntry {
    /// `() => import(/* webpackChunkName: '...' */ "...")`
    pub loader_expression: String,
    pub module_path: String,
}

/// `ModuleTree` と同じ形をした、チャンク名のツリー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChunkNames {
    Id(String),
    Sequence(Vec<ChunkNames>),
    Named(IndexMap<String, ChunkNames>),
    Null,
}

impl ChunkNames {
    fn is_empty(&self) -> bool {
        match self {
            ChunkNames::Null => true,
            ChunkNames::Named(map) => map.is_empty(),
            ChunkNames::Sequence(items) => items.is_empty(),
            ChunkNames::Id(_) => false,
        }
    }

    /// ツリー内のすべてのチャンク名を深さ優先で集める
    pub fn ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            ChunkNames::Id(id) => ids.push(id),
            ChunkNames::Sequence(items) => items.iter().for_each(|item| item.collect_ids(ids)),
            ChunkNames::Named(map) => map.values().for_each(|item| item.collect_ids(ids)),
            ChunkNames::Null => {}
        }
    }
}

/// 1 つのルートパスに割り当てられたチャンク名
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteChunks {
    pub component: ChunkNames,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<ChunkNames>,
}

impl RouteChunks {
    /// 同じパスを再訪したときの合成。
    /// component は置き換え、modules は名前付きマップ同士なら浅くマージする。
    fn merge(&mut self, component: ChunkNames, modules: Option<ChunkNames>) {
        self.component = component;
        match (&mut self.modules, modules) {
            (_, None) => {}
            (Some(ChunkNames::Named(existing)), Some(ChunkNames::Named(incoming))) => {
                existing.extend(incoming);
            }
            (slot, incoming) => *slot = incoming,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids = self.component.ids();
        if let Some(modules) = &self.modules {
            ids.extend(modules.ids());
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub registry: Registry,
    /// バンドラに渡すルーター設定のソース
    pub routes_config: String,
    pub routes_chunk_names: RouteChunkNames,
    /// 静的レンダリング対象のパス (先頭は常に 404 ページ)
    pub routes_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    pub naming: ChunkNaming,
    pub not_found_path: String,
    /// 生成コードで React を読み込むモジュール
    pub react_import: String,
    /// パスからコンポーネントを作るヘルパーのモジュール
    pub component_creator_import: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            naming: ChunkNaming::Descriptive,
            not_found_path: NOT_FOUND_PATH.to_owned(),
            react_import: "react".to_owned(),
            component_creator_import: "@docusaurus/ComponentCreator".to_owned(),
        }
    }
}

/// 1 回のコンパイル中だけ存在する蓄積先。再帰の各段に `&mut` で渡す
#[derive(Debug, Default)]
struct Accumulator {
    registry: Registry,
    routes_chunk_names: RouteChunkNames,
    routes_paths: Vec<String>,
}

impl Accumulator {
    /// チャンクをレジストリに登録する。
    ///
    /// 同じ名前で別のモジュールが来た場合は先に登録した方を残し、警告を出す。
    /// 後から来た方で上書きしていた以前の挙動とは異なる。
    fn register(&mut self, chunk_name: &str, module_path: String) {
        match self.registry.get(chunk_name) {
            Some(existing) if existing.module_path != module_path => {
                warn!(
                    chunk = chunk_name,
                    kept = %existing.module_path,
                    ignored = %module_path,
                    "チャンク名が別のモジュールと衝突しました。先に登録した方を使います"
                );
            }
            Some(_) => {}
            None => {
                trace!(chunk = chunk_name, module = %module_path, "チャンク登録");
                self.registry.insert(
                    chunk_name.to_owned(),
                    ChunkRegistryEntry {
                        loader_expression: loader_expression(chunk_name, &module_path),
                        module_path,
                    },
                );
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteCompiler {
    options: CompilerOptions,
}

impl RouteCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        RouteCompiler { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// 型の無い JSON のルート定義列をコンパイルする。
    ///
    /// 1 件でも不正なルートがあれば何も出力せずに `CompileError` を返す。
    pub fn compile(&self, raw_routes: &[Value]) -> Result<CompileResult, CompileError> {
        let routes = raw_routes
            .iter()
            .map(RouteDescriptor::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.compile_descriptors(&routes))
    }

    /// 検証済みのルート定義列をコンパイルする
    pub fn compile_descriptors(&self, routes: &[RouteDescriptor]) -> CompileResult {
        let mut acc = Accumulator {
            routes_paths: vec![self.options.not_found_path.clone()],
            ..Accumulator::default()
        };

        let mut route_objects: Vec<String> = routes
            .iter()
            .map(|route| self.emit_route(route, &mut acc))
            .collect();
        route_objects.push(NOT_FOUND_ROUTE.to_owned());

        // 同じパスの再訪で置き換えられたチャンクはどこからも参照されない
        let used: BTreeSet<&str> = acc
            .routes_chunk_names
            .values()
            .flat_map(RouteChunks::ids)
            .collect();
        let before = acc.registry.len();
        acc.registry.retain(|id, _| used.contains(id.as_str()));
        if acc.registry.len() != before {
            debug!(pruned = before - acc.registry.len(), "未参照のチャンクを削除");
        }

        let routes_config = format!(
            "\nimport React from {};\nimport ComponentCreator from {};\n\nexport default [\n  {}\n];\n",
            js_single_quoted(&self.options.react_import),
            js_single_quoted(&self.options.component_creator_import),
            route_objects.join(",\n  ")
        );

        info!(
            routes = routes.len(),
            chunks = acc.registry.len(),
            static_paths = acc.routes_paths.len(),
            "ルートのコンパイル完了"
        );

        CompileResult {
            registry: acc.registry,
            routes_config,
            routes_chunk_names: acc.routes_chunk_names,
            routes_paths: acc.routes_paths,
        }
    }

    /// 1 件のルートをルートオブジェクトのリテラルに変換する (子ルートは再帰)
    fn emit_route(&self, route: &RouteDescriptor, acc: &mut Accumulator) -> String {
        debug!(path = %route.path, leaf = route.is_leaf(), "ルート生成");

        if route.is_leaf() {
            acc.routes_paths.push(route.path.clone());
        }

        let component_hint = route.component.name_hint();
        let component = self.resolve_chunk_tree(
            &route.component,
            Some("component"),
            component_hint.as_deref(),
            acc,
        );
        let modules = self.resolve_chunk_tree(&route.modules, Some("module"), Some(route.path.as_str()), acc);
        let modules = (!modules.is_empty()).then_some(modules);

        match acc.routes_chunk_names.get_mut(&route.path) {
            Some(existing) => existing.merge(component, modules),
            None => {
                acc.routes_chunk_names
                    .insert(route.path.clone(), RouteChunks { component, modules });
            }
        }

        let routes_str = match &route.routes {
            Some(children) => {
                let children: Vec<String> = children
                    .iter()
                    .map(|child| self.emit_route(child, acc))
                    .collect();
                format!("routes: [{}],", children.join(","))
            }
            None => String::new(),
        };
        let exact_str = if route.exact { "exact: true," } else { "" };
        let path = js_single_quoted(&route.path);

        format!(
            "\n{{\n  path: {path},\n  component: ComponentCreator({path}),\n  {exact_str}\n  {routes_str}\n}}"
        )
    }

    /// モジュールツリーを同じ形のチャンク名ツリーに変換し、葉をレジストリへ登録する
    fn resolve_chunk_tree(
        &self,
        tree: &ModuleTree,
        prefix: Option<&str>,
        name: Option<&str>,
        acc: &mut Accumulator,
    ) -> ChunkNames {
        match tree {
            ModuleTree::Empty => ChunkNames::Null,
            ModuleTree::Sequence(items) => ChunkNames::Sequence(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let index = index.to_string();
                        self.resolve_chunk_tree(item, Some(index.as_str()), name, acc)
                    })
                    .collect(),
            ),
            ModuleTree::Leaf(module) => {
                let module_path = module.module_path();
                let id = chunk_name(self.options.naming, &module_path, prefix, name);
                acc.register(&id, module_path);
                ChunkNames::Id(id)
            }
            ModuleTree::Named(map) => ChunkNames::Named(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.resolve_chunk_tree(item, Some(key.as_str()), name, acc)))
                    .collect(),
            ),
        }
    }
}

const NOT_FOUND_ROUTE: &str = "\n  {\n    path: '*',\n    component: ComponentCreator('*')\n  }";

/// 既定のオプションでコンパイルする
pub fn compile(raw_routes: &[Value]) -> Result<CompileResult, CompileError> {
    RouteCompiler::default().compile(raw_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn docs_routes() -> Vec<Value> {
        vec![
            json!({"path": "/", "component": "./Home.js", "exact": true}),
            json!({
                "path": "/docs",
                "component": "./DocsLayout.js",
                "modules": {"sidebar": "./sidebar.json"},
                "routes": [
                    {"path": "/docs/intro", "component": "./DocItem.js", "modules": {"content": "./intro.md"}, "exact": true},
                    {"path": "/docs/api", "component": "./DocItem.js", "modules": {"content": "./api.md"}, "exact": true}
                ]
            }),
        ]
    }

    #[rstest]
    fn empty_input_yields_only_not_found() {
        let result = compile(&[]).unwrap();
        assert_eq!(result.routes_paths, vec!["404.html".to_string()]);
        assert!(result.registry.is_empty());
        assert!(result.routes_chunk_names.is_empty());
        assert!(result.routes_config.contains("path: '*'"));
        // 疎配列にならないこと
        assert!(!result.routes_config.contains("[\n  ,"));
    }

    #[rstest]
    fn leaf_route_with_exact() {
        let result = compile(&[json!({"path": "/blog", "component": "./Blog.js", "exact": true})]).unwrap();

        assert!(result.routes_config.contains("path: '/blog',"));
        assert!(result.routes_config.contains("component: ComponentCreator('/blog'),"));
        assert!(result.routes_config.contains("exact: true,"));
        assert!(!result.routes_config.contains("routes:"));
        assert_eq!(result.routes_paths, vec!["404.html", "/blog"]);
        assert_eq!(result.registry.len(), 1);
        let entry = result.registry.values().next().unwrap();
        assert_eq!(entry.module_path, "./Blog.js");
        assert!(entry.loader_expression.contains("\"./Blog.js\""));
    }

    #[rstest]
    fn modules_resolve_into_registry() {
        let result = compile(&[json!({
            "path": "/blog",
            "component": "./Blog.js",
            "modules": {"metadata": "./meta.json"}
        })])
        .unwrap();

        let chunks = &result.routes_chunk_names["/blog"];
        let Some(ChunkNames::Named(modules)) = &chunks.modules else {
            panic!("modules missing: {chunks:?}");
        };
        let ChunkNames::Id(id) = &modules["metadata"] else {
            panic!("metadata is not a chunk id");
        };
        assert!(id.starts_with("metadata---"), "{id}");
        assert_eq!(result.registry[id].module_path, "./meta.json");
    }

    #[rstest]
    fn nested_routes(docs_routes: Vec<Value>) {
        let result = compile(&docs_routes).unwrap();

        assert_eq!(result.routes_paths, vec!["404.html", "/", "/docs/intro", "/docs/api"]);
        assert_eq!(result.routes_config.matches("routes: [").count(), 1);
        assert!(result.routes_config.trim_end().ends_with("component: ComponentCreator('*')\n  }\n];"));
    }

    #[rstest]
    fn component_shared_between_routes_gets_one_entry(docs_routes: Vec<Value>) {
        let result = compile(&docs_routes).unwrap();
        let intro = &result.routes_chunk_names["/docs/intro"].component;
        let api = &result.routes_chunk_names["/docs/api"].component;
        assert_eq!(intro, api);
        let doc_item_entries = result
            .registry
            .values()
            .filter(|entry| entry.module_path == "./DocItem.js")
            .count();
        assert_eq!(doc_item_entries, 1);
    }

    #[rstest]
    fn every_chunk_name_has_registry_entry_and_vice_versa(docs_routes: Vec<Value>) {
        let result = compile(&docs_routes).unwrap();
        let mut used: Vec<&str> = result
            .routes_chunk_names
            .values()
            .flat_map(RouteChunks::ids)
            .collect();
        used.sort_unstable();
        used.dedup();
        let registered: Vec<&str> = result.registry.keys().map(String::as_str).collect();
        assert_eq!(used, registered);
    }

    #[rstest]
    fn output_is_deterministic(docs_routes: Vec<Value>) {
        assert_eq!(compile(&docs_routes).unwrap(), compile(&docs_routes).unwrap());
    }

    #[rstest]
    fn missing_component_aborts_whole_compile() {
        let err = compile(&[
            json!({"path": "/ok", "component": "./Ok.js"}),
            json!({"path": "/broken"}),
        ])
        .unwrap_err();
        assert!(err.to_string().contains(r#"{"path":"/broken"}"#));
    }

    #[rstest]
    fn sequence_modules_use_index_prefix() {
        let result = compile(&[json!({
            "path": "/tags",
            "component": "./Tags.js",
            "modules": {"items": ["./a.md", "./b.md"]}
        })])
        .unwrap();
        let Some(ChunkNames::Named(modules)) = &result.routes_chunk_names["/tags"].modules else {
            panic!("modules missing");
        };
        let ChunkNames::Sequence(items) = &modules["items"] else {
            panic!("items is not a sequence");
        };
        let ids: Vec<&str> = items.iter().flat_map(ChunkNames::ids).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids[0].starts_with("0---"), "{}", ids[0]);
        assert!(ids[1].starts_with("1---"), "{}", ids[1]);
    }

    #[rstest]
    fn revisited_path_merges_modules() {
        let result = compile(&[
            json!({"path": "/p", "component": "./P.js", "modules": {"a": "./a.json"}}),
            json!({"path": "/p", "component": "./P.js", "modules": {"b": "./b.json"}}),
        ])
        .unwrap();
        let Some(ChunkNames::Named(modules)) = &result.routes_chunk_names["/p"].modules else {
            panic!("modules missing");
        };
        assert_eq!(modules.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(result.routes_paths, vec!["404.html", "/p", "/p"]);
    }

    #[rstest]
    fn revisited_path_with_new_component_drops_the_old_chunk() {
        let result = compile(&[
            json!({"path": "/p", "component": "./Old.js"}),
            json!({"path": "/p", "component": "./New.js"}),
        ])
        .unwrap();
        let paths: Vec<&str> = result.registry.values().map(|e| e.module_path.as_str()).collect();
        assert_eq!(paths, vec!["./New.js"]);
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!([]))]
    #[case(json!(null))]
    fn empty_modules_omit_the_key(#[case] modules: Value) {
        let result = compile(&[json!({"path": "/a", "component": "./A.js", "modules": modules})]).unwrap();
        assert_eq!(result.routes_chunk_names["/a"].modules, None);
    }

    #[rstest]
    fn non_exact_route_emits_no_exact_flag() {
        let result = compile(&[json!({"path": "/a", "component": "./A.js", "exact": false})]).unwrap();
        assert!(!result.routes_config.contains("exact:"));
    }

    #[rstest]
    fn null_module_value_serializes_as_null() {
        let result = compile(&[json!({
            "path": "/a",
            "component": "./A.js",
            "modules": {"metadata": "./meta.json", "missing": null}
        })])
        .unwrap();
        let json = serde_json::to_value(&result.routes_chunk_names).unwrap();
        assert!(json["/a"]["modules"]["metadata"].is_string());
        assert!(json["/a"]["modules"]["missing"].is_null());
        assert!(json["/a"]["modules"].as_object().unwrap().contains_key("missing"));
        assert_eq!(result.registry.len(), 2);
    }

    #[rstest]
    fn route_without_modules_omits_the_key() {
        let result = compile(&[json!({"path": "/a", "component": "./A.js"})]).unwrap();
        assert_eq!(result.routes_chunk_names["/a"].modules, None);
        let json = serde_json::to_value(&result.routes_chunk_names).unwrap();
        assert!(json["/a"].get("modules").is_none());
    }

    #[rstest]
    fn short_naming_option() {
        let compiler = RouteCompiler::new(CompilerOptions {
            naming: ChunkNaming::Short,
            ..CompilerOptions::default()
        });
        let result = compiler
            .compile(&[json!({"path": "/a", "component": "./A.js"})])
            .unwrap();
        let id = result.registry.keys().next().unwrap();
        assert_eq!(id.len(), 8);
    }

    #[rstest]
    fn short_naming_keeps_shifted_keys_apart() {
        let compiler = RouteCompiler::new(CompilerOptions {
            naming: ChunkNaming::Short,
            ..CompilerOptions::default()
        });
        let result = compiler
            .compile(&[json!({
                "path": "/p",
                "component": "./P.js",
                "modules": {"10": "./a", "0": "./a1"}
            })])
            .unwrap();
        let Some(ChunkNames::Named(modules)) = &result.routes_chunk_names["/p"].modules else {
            panic!("modules missing");
        };
        assert_ne!(modules["10"], modules["0"]);
        let mut paths: Vec<&str> = result.registry.values().map(|e| e.module_path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["./P.js", "./a", "./a1"]);
    }

    #[rstest]
    fn custom_imports_and_not_found_path() {
        let compiler = RouteCompiler::new(CompilerOptions {
            not_found_path: "404/index.html".into(),
            react_import: "preact/compat".into(),
            ..CompilerOptions::default()
        });
        let result = compiler.compile(&[]).unwrap();
        assert_eq!(result.routes_paths, vec!["404/index.html"]);
        assert!(result.routes_config.contains("import React from 'preact/compat';"));
    }

    #[rstest]
    fn structured_component_with_query() {
        let result = compile(&[json!({
            "path": "/post",
            "component": {"__import": true, "path": "./Post.js", "query": {"v": 2}}
        })])
        .unwrap();
        let entry = result.registry.values().next().unwrap();
        assert_eq!(entry.module_path, "./Post.js?v=2");
    }

    #[rstest]
    fn colliding_chunk_name_keeps_first_entry() {
        let mut acc = Accumulator::default();
        acc.register("same", "./first.js".into());
        acc.register("same", "./second.js".into());
        assert_eq!(acc.registry.len(), 1);
        assert_eq!(acc.registry["same"].module_path, "./first.js");
    }
}
