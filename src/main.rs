// src/main.rs

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use route_compiler::parser::{check_registry_module, parse_generated_routes};
use route_compiler::render::{render_chunk_names, render_registry_module};
use route_compiler::resolver::{collect_route_files, load_route_descriptors};
use route_compiler::{ChunkNaming, CompileResult, CompilerOptions, NOT_FOUND_PATH, RouteCompiler};

/// 標準出力に書き出す内容
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Output {
    /// CompileResult 全体を JSON で
    All,
    /// ルーター設定のソース
    Config,
    /// レジストリの ES モジュール
    Registry,
    /// ルートごとのチャンク名 (JSON)
    ChunkNames,
    /// 静的レンダリング対象のパス (JSON)
    Paths,
}

/// CLI 引数定義
#[derive(Parser, Debug)]
#[command(
    name = "route-compiler",
    version,
    about = "ルート定義 (JSON) をクライアントルーター用の生成コードとチャンクレジストリにコンパイルする"
)]
struct Cli {
    /// ルート定義の JSON ファイル、またはそれを含むディレクトリ
    #[arg(short = 'r', long = "routes", value_name = "PATH")]
    routes: PathBuf,

    /// チャンク名を 8 桁のハッシュにする (本番ビルド向け)
    #[arg(long)]
    short_chunk_names: bool,

    /// 静的パス一覧の先頭に入れる 404 ページのパス
    #[arg(long, value_name = "PATH", default_value = NOT_FOUND_PATH)]
    not_found_path: String,

    /// 生成したソースを SWC でパースして検査する
    #[arg(long)]
    check: bool,

    #[arg(short = 'o', long, value_enum, default_value_t = Output::All)]
    output: Output,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログは標準エラーへ (標準出力は生成物のため)
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "route_compiler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // 1) CLI 引数をパースし、ルート定義ファイルを集める
    let cli = Cli::parse();
    let files = collect_route_files(&cli.routes)?;
    info!(files = files.len(), "ルート定義ファイルを読み込み中");
    let raw_routes = load_route_descriptors(&files)?;

    // 2) コンパイル
    let compiler = RouteCompiler::new(CompilerOptions {
        naming: if cli.short_chunk_names {
            ChunkNaming::Short
        } else {
            ChunkNaming::Descriptive
        },
        not_found_path: cli.not_found_path,
        ..CompilerOptions::default()
    });
    let result = compiler.compile(&raw_routes)?;

    // 3) 必要なら生成物をパースし直して検査
    if cli.check {
        check(&result)?;
    }

    // 4) 出力
    let out = match cli.output {
        Output::All => serde_json::to_string_pretty(&result)?,
        Output::Config => result.routes_config,
        Output::Registry => render_registry_module(&result.registry),
        Output::ChunkNames => render_chunk_names(&result.routes_chunk_names)?,
        Output::Paths => serde_json::to_string_pretty(&result.routes_paths)?,
    };
    println!("{}", out);

    Ok(())
}

fn check(result: &CompileResult) -> Result<(), Box<dyn std::error::Error>> {
    let routes = parse_generated_routes(&result.routes_config)?;
    let entries = check_registry_module(&render_registry_module(&result.registry))?;
    if entries != result.registry.len() {
        return Err(format!(
            "registry module has {entries} entries, expected {}",
            result.registry.len()
        )
        .into());
    }
    info!(routes = routes.len(), chunks = entries, "生成コードの検査に成功");
    Ok(())
}
