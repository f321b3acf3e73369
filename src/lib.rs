// src/lib.rs
//! ルート定義のリストを、クライアントルーター用の生成コードと
//! 遅延ロード用チャンクのレジストリへコンパイルする。
//!
//! ```
//! use serde_json::json;
//!
//! let result = route_compiler::compile(&[json!({
//!     "path": "/blog",
//!     "component": "./Blog.js",
//!     "exact": true,
//! })])
//! .unwrap();
//! assert_eq!(result.routes_paths, ["404.html", "/blog"]);
//! ```

pub mod chunk;
pub mod compiler;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;
pub mod resolver;

pub use chunk::ChunkNaming;
pub use compiler::{
    ChunkNames, ChunkRegistryEntry, CompileResult, CompilerOptions, NOT_FOUND_PATH, Registry,
    RouteChunkNames, RouteChunks, RouteCompiler, compile,
};
pub use error::{CheckError, CompileError, LoadError};
pub use model::{ModuleRef, ModuleTree, RouteDescriptor};
