// src/parser.rs
use swc_common::{FileName, SourceMap, sync::Lrc};
use swc_ecma_ast::*;
use swc_ecma_parser::{Parser as SwcParser, StringInput, Syntax, lexer::Lexer};
use swc_ecma_visit::{Visit, VisitWith};
use tracing::debug;

use crate::error::CheckError;

/// 生成コードから読み戻したルートオブジェクト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoute {
    pub path: String,
    pub exact: bool,
    pub routes: Option<Vec<ParsedRoute>>,
}

/// `export default [...]` を探して、ルートオブジェクトの配列として読む Visitor
struct RouteConfigVisitor {
    routes: Option<Vec<ParsedRoute>>,
    error: Option<CheckError>,
}

impl Visit for RouteConfigVisitor {
    fn visit_export_default_expr(&mut self, export: &ExportDefaultExpr) {
        match &*export.expr {
            Expr::Array(arr_lit) => match parse_route_array(arr_lit) {
                Ok(routes) => self.routes = Some(routes),
                Err(e) => self.error = Some(e),
            },
            other => {
                self.error = Some(CheckError::Shape(format!(
                    "default export is not an array literal: {other:?}"
                )));
            }
        }
    }
}

fn parse_route_array(arr_lit: &ArrayLit) -> Result<Vec<ParsedRoute>, CheckError> {
    let mut routes = Vec::with_capacity(arr_lit.elems.len());
    for (i, elem) in arr_lit.elems.iter().enumerate() {
        let Some(expr_and_span) = elem else {
            return Err(CheckError::Shape(format!("hole at route index {i}")));
        };
        if expr_and_span.spread.is_some() {
            return Err(CheckError::Shape(format!("spread at route index {i}")));
        }
        match &*expr_and_span.expr {
            Expr::Object(obj_lit) => routes.push(parse_route_object(obj_lit)?),
            _ => {
                return Err(CheckError::Shape(format!(
                    "route index {i} is not an object literal"
                )));
            }
        }
    }
    Ok(routes)
}

/// `{ path: '...', component: ComponentCreator('...'), exact: true, routes: [...] }` を読む
fn parse_route_object(obj_lit: &ObjectLit) -> Result<ParsedRoute, CheckError> {
    let mut path: Option<String> = None;
    let mut has_component = false;
    let mut exact = false;
    let mut routes: Option<Vec<ParsedRoute>> = None;

    for prop in &obj_lit.props {
        let PropOrSpread::Prop(boxed_prop) = prop else {
            return Err(CheckError::Shape("spread inside route object".into()));
        };
        let Prop::KeyValue(KeyValueProp { key, value }) = &**boxed_prop else {
            return Err(CheckError::Shape("route object property is not key: value".into()));
        };
        let key_name = match key {
            PropName::Ident(ident) => ident.sym.to_string(),
            PropName::Str(s) => s.value.to_string(),
            _ => return Err(CheckError::Shape("unsupported property key".into())),
        };

        match (key_name.as_str(), &**value) {
            ("path", Expr::Lit(Lit::Str(Str { value: s, .. }))) => path = Some(s.to_string()),
            ("component", Expr::Call(_)) => has_component = true,
            ("exact", Expr::Lit(Lit::Bool(Bool { value: b, .. }))) => exact = *b,
            ("routes", Expr::Array(arr_lit)) => routes = Some(parse_route_array(arr_lit)?),
            (other, _) => {
                return Err(CheckError::Shape(format!(
                    "unexpected value for route property `{other}`"
                )));
            }
        }
    }

    let path = path.ok_or_else(|| CheckError::Shape("route object without path".into()))?;
    if !has_component {
        return Err(CheckError::Shape(format!("route `{path}` has no component")));
    }
    Ok(ParsedRoute {
        path,
        exact,
        routes,
    })
}

fn parse_module(name: &str, src: &str) -> Result<Module, CheckError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom(name.to_owned()), src.to_owned());

    let lexer = Lexer::new(
        Syntax::Es(Default::default()),
        Default::default(), // es version
        StringInput::from(&*fm),
        None,
    );
    let mut parser = SwcParser::new_from(lexer);

    let module = parser
        .parse_module()
        .map_err(|e| CheckError::Parse(format!("{name}: {:?}", e.kind())))?;

    // 回復可能なエラーも不正とみなす
    if let Some(e) = parser.take_errors().into_iter().next() {
        return Err(CheckError::Parse(format!("{name}: {:?}", e.kind())));
    }
    Ok(module)
}

/// 生成したルーター設定をパースし、default export されたルート配列を読み戻す
pub fn parse_generated_routes(src: &str) -> Result<Vec<ParsedRoute>, CheckError> {
    let module = parse_module("routes.js", src)?;

    let mut visitor = RouteConfigVisitor {
        routes: None,
        error: None,
    };
    module.visit_with(&mut visitor);

    if let Some(e) = visitor.error {
        return Err(e);
    }
    let routes = visitor
        .routes
        .ok_or_else(|| CheckError::Shape("no `export default [...]` found".into()))?;
    debug!(routes = routes.len(), "生成コードの検査完了");
    Ok(routes)
}

/// レジストリモジュールの default export オブジェクトを数える Visitor
#[derive(Default)]
struct RegistryVisitor {
    entries: Option<usize>,
    error: Option<CheckError>,
}

impl Visit for RegistryVisitor {
    fn visit_export_default_expr(&mut self, export: &ExportDefaultExpr) {
        let Expr::Object(obj_lit) = &*export.expr else {
            self.error = Some(CheckError::Shape("registry default export is not an object".into()));
            return;
        };
        for prop in &obj_lit.props {
            let is_entry = matches!(
                prop,
                PropOrSpread::Prop(p) if matches!(
                    &**p,
                    Prop::KeyValue(KeyValueProp { value, .. })
                        if matches!(&**value, Expr::Array(ArrayLit { elems, .. }) if elems.len() == 2)
                )
            );
            if !is_entry {
                self.error = Some(CheckError::Shape(
                    "registry entry is not a [loader, modulePath] pair".into(),
                ));
                return;
            }
        }
        self.entries = Some(obj_lit.props.len());
    }
}

/// `render_registry_module` の出力をパースし、エントリ数を返す
pub fn check_registry_module(src: &str) -> Result<usize, CheckError> {
    let module = parse_module("registry.js", src)?;
    let mut visitor = RegistryVisitor::default();
    module.visit_with(&mut visitor);

    if let Some(e) = visitor.error {
        return Err(e);
    }
    visitor
        .entries
        .ok_or_else(|| CheckError::Shape("no `export default {...}` found".into()))
}
