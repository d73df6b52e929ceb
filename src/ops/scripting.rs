// ============================================================================
// Gesture scripting: Rhai scripts that drive a Session the way a user would
// ============================================================================
//
// Scripts call the same entry points as the pointer glue: pick a layout and
// tool, press, move and release, undo and redo. Everything runs synchronously
// on the calling thread inside a sandboxed engine.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rhai::{AST, Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position, Scope};

use crate::canvas::LayoutKind;
use crate::components::colors::{PALETTE, format_hex};
use crate::components::tools::Tool;
use crate::session::Session;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn at(message: String, pos: Position) -> Self {
        Self {
            message,
            line: pos.line().filter(|&l| l > 0),
            column: pos.position().filter(|&c| c > 0),
        }
    }

    /// Error explanation with line/column context and suggestions.
    pub fn friendly_message(&self) -> String {
        let raw = &self.message;
        let cleaned = raw.split(" (line ").next().unwrap_or(raw);
        let mut parts = Vec::new();

        match (self.line, self.column) {
            (Some(line), Some(col)) => parts.push(format!("Error on line {}, column {}:", line, col)),
            (Some(line), None) => parts.push(format!("Error on line {}:", line)),
            _ => parts.push("Script error:".to_string()),
        }

        if raw.contains("Function not found:") {
            let fn_desc = raw
                .strip_prefix("Function not found: ")
                .map(|s| s.split(" (line ").next().unwrap_or(s))
                .unwrap_or(cleaned);
            parts.push(format!("  Could not find function: {}", fn_desc.trim()));
            parts.push(String::new());
            parts.push("  Tip: gesture functions are down, move_to, up, leave, click and drag.".to_string());
            parts.push("  Coordinates may be integers or floats.".to_string());
        } else if raw.contains("Variable not found:") {
            let var_name = raw
                .split("Variable not found:")
                .nth(1)
                .map(|v| v.split('(').next().unwrap_or(v).trim())
                .unwrap_or("");
            parts.push(format!("  Variable '{}' is not defined.", var_name));
            parts.push(String::new());
            parts.push("  Tip: declare it with 'let' before using it:".to_string());
            parts.push(format!("    let {} = 0;", var_name));
        } else if raw.contains("Syntax error") || raw.contains("Expected") {
            parts.push(format!("  Syntax error: {}", cleaned));
            parts.push(String::new());
            parts.push("  Tip: check for missing semicolons, brackets, or typos near this line.".to_string());
        } else if raw.contains("Too many operations") {
            parts.push("  Script exceeded the maximum operation limit.".to_string());
            parts.push(String::new());
            parts.push("  Tip: look for a loop that never ends.".to_string());
        } else if raw.contains("Unknown layout") {
            parts.push(format!("  {}", cleaned));
            let names: Vec<&str> = LayoutKind::all().iter().map(|k| k.config_name()).collect();
            parts.push(format!("  Known layouts: {}", names.join(", ")));
        } else if raw.contains("Unknown tool") {
            parts.push(format!("  {}", cleaned));
            let names: Vec<&str> = Tool::all().iter().map(|t| t.id()).collect();
            parts.push(format!("  Known tools: {}", names.join(", ")));
        } else if raw.contains("No drawing gesture") {
            parts.push(format!("  {}", cleaned));
            parts.push(String::new());
            parts.push("  Tip: call down(x, y) before move_to() or up().".to_string());
        } else {
            parts.push(format!("  {}", cleaned));
        }

        parts.join("\n")
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "Line {}, Col {}: {}", line, col, self.message),
            (Some(line), None) => write!(f, "Line {}: {}", line, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ScriptError {}

/// What a successful run leaves behind besides the edited session.
#[derive(Debug, Clone, Default)]
pub struct ScriptOutcome {
    pub console_output: Vec<String>,
    pub elapsed_ms: u64,
}

// ============================================================================
// Script context: shared mutable state between engine and host functions
// ============================================================================

#[derive(Default)]
struct ScriptContext {
    session: Session,
    console_output: Vec<String>,
}

type SharedContext = Arc<Mutex<ScriptContext>>;

type HostResult<T> = Result<T, Box<EvalAltResult>>;

fn lock(ctx: &SharedContext) -> std::sync::MutexGuard<'_, ScriptContext> {
    ctx.lock().unwrap_or_else(|e| e.into_inner())
}

/// Accept both `10` and `10.5` wherever a coordinate is expected.
fn coord(v: &Dynamic) -> HostResult<f32> {
    if let Ok(i) = v.as_int() {
        return Ok(i as f32);
    }
    if let Ok(f) = v.as_float() {
        return Ok(f as f32);
    }
    Err(format!("Expected a number for a coordinate, got {}", v.type_name()).into())
}

// ============================================================================
// Engine construction with sandbox + API registration
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(50_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    register_setup_api(&mut engine, ctx.clone());
    register_gesture_api(&mut engine, ctx.clone());
    register_history_api(&mut engine, ctx.clone());
    register_query_api(&mut engine, ctx.clone());
    register_utility_api(&mut engine, ctx);

    engine
}

// ============================================================================
// Layout and tool setup
// ============================================================================

fn register_setup_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("layout", move |name: ImmutableString| -> HostResult<()> {
        let kind = LayoutKind::from_name(&name).ok_or_else(|| format!("Unknown layout '{}'", name))?;
        lock(&c).session.set_layout(kind);
        Ok(())
    });

    // Returns false when the tool is unavailable on the current layout.
    let c = ctx.clone();
    engine.register_fn("tool", move |name: ImmutableString| -> HostResult<bool> {
        let tool = Tool::from_name(&name).ok_or_else(|| format!("Unknown tool '{}'", name))?;
        Ok(lock(&c).session.select_tool(tool))
    });

    let c = ctx.clone();
    engine.register_fn("color", move |hex: ImmutableString| -> bool {
        lock(&c).session.set_color_hex(&hex)
    });

    let c = ctx.clone();
    engine.register_fn("opacity", move |v: f64| {
        lock(&c).session.set_opacity(v as f32);
    });
    let c = ctx.clone();
    engine.register_fn("opacity", move |v: i64| {
        lock(&c).session.set_opacity(v as f32);
    });

    let c = ctx.clone();
    engine.register_fn("thickness", move |v: i64| {
        lock(&c).session.set_thickness(v.clamp(1, u32::MAX as i64) as u32);
    });

    let c = ctx.clone();
    engine.register_fn("grid", move |visible: bool| {
        lock(&c).session.set_grid_visible(visible);
    });

    let c = ctx;
    engine.register_fn("seed", move |seed: i64| {
        lock(&c).session.seed_rng(seed as u64);
    });

    engine.register_fn("swatch", |i: i64| -> HostResult<String> {
        usize::try_from(i)
            .ok()
            .and_then(|i| PALETTE.get(i))
            .map(|rgb| format_hex(*rgb))
            .ok_or_else(|| format!("Swatch index {} is out of range 0..{}", i, PALETTE.len()).into())
    });
}

// ============================================================================
// Pointer gestures
// ============================================================================

fn register_gesture_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("down", move |x: Dynamic, y: Dynamic| -> HostResult<()> {
        let (x, y) = (coord(&x)?, coord(&y)?);
        lock(&c).session.pointer_down(x, y);
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("move_to", move |x: Dynamic, y: Dynamic| -> HostResult<()> {
        let (x, y) = (coord(&x)?, coord(&y)?);
        lock(&c).session.pointer_move(x, y).map_err(|e| e.to_string().into())
    });

    let c = ctx.clone();
    engine.register_fn("up", move || -> HostResult<()> {
        lock(&c).session.pointer_up().map_err(|e| e.to_string().into())
    });

    let c = ctx.clone();
    engine.register_fn("leave", move || {
        lock(&c).session.pointer_leave();
    });

    // Press and release in place: a fill, a spray dot, a pen dot.
    let c = ctx.clone();
    engine.register_fn("click", move |x: Dynamic, y: Dynamic| -> HostResult<()> {
        let (x, y) = (coord(&x)?, coord(&y)?);
        let mut lock = lock(&c);
        lock.session.pointer_down(x, y);
        if lock.session.is_drawing() {
            lock.session.pointer_up().map_err(|e| e.to_string())?;
        }
        Ok(())
    });

    let c = ctx;
    engine.register_fn(
        "drag",
        move |x0: Dynamic, y0: Dynamic, x1: Dynamic, y1: Dynamic| -> HostResult<()> {
            let (x0, y0, x1, y1) = (coord(&x0)?, coord(&y0)?, coord(&x1)?, coord(&y1)?);
            let mut lock = lock(&c);
            lock.session.pointer_down(x0, y0);
            if lock.session.is_drawing() {
                lock.session.pointer_move(x1, y1).map_err(|e| e.to_string())?;
                lock.session.pointer_up().map_err(|e| e.to_string())?;
            }
            Ok(())
        },
    );
}

// ============================================================================
// History
// ============================================================================

fn register_history_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("undo", move || -> bool { lock(&c).session.undo() });

    let c = ctx.clone();
    engine.register_fn("redo", move || -> bool { lock(&c).session.redo() });

    let c = ctx.clone();
    engine.register_fn("clear", move || {
        lock(&c).session.clear();
    });

    let c = ctx.clone();
    engine.register_fn("can_undo", move || -> bool { lock(&c).session.can_undo() });

    let c = ctx.clone();
    engine.register_fn("can_redo", move || -> bool { lock(&c).session.can_redo() });

    let c = ctx;
    engine.register_fn("history_len", move || -> i64 {
        lock(&c).session.history().len() as i64
    });
}

// ============================================================================
// Canvas queries
// ============================================================================

fn register_query_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("width", move || -> i64 { lock(&c).session.width() as i64 });

    let c = ctx.clone();
    engine.register_fn("height", move || -> i64 { lock(&c).session.height() as i64 });

    let c = ctx.clone();
    engine.register_fn("current_tool", move || -> String {
        lock(&c).session.tool().id().to_string()
    });

    // pixel(x, y) -> [r, g, b, a] of the committed buffer, zeros off-canvas
    let c = ctx;
    engine.register_fn("pixel", move |x: i64, y: i64| -> Array {
        let lock = lock(&c);
        let px = i32::try_from(x)
            .ok()
            .zip(i32::try_from(y).ok())
            .and_then(|(x, y)| lock.session.canvas().committed.pixel_at(x, y))
            .map(|p| p.0)
            .unwrap_or([0; 4]);
        px.iter().map(|&v| Dynamic::from(v as i64)).collect()
    });
}

// ============================================================================
// Utilities
// ============================================================================

fn register_utility_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx;
    engine.on_print(move |msg| {
        log_info!("[script] {}", msg);
        lock(&c).console_output.push(msg.to_string());
    });

    engine.register_fn("clamp", |v: i64, lo: i64, hi: i64| -> i64 { v.clamp(lo, hi.max(lo)) });
    engine.register_fn("lerp", |a: f64, b: f64, t: f64| -> f64 { a + (b - a) * t });
    engine.register_fn("sin", |x: f64| -> f64 { x.sin() });
    engine.register_fn("cos", |x: f64| -> f64 { x.cos() });
    engine.register_fn("PI", || -> f64 { std::f64::consts::PI });
}

// ============================================================================
// Public execution API
// ============================================================================

/// Compile a script without running it.
pub fn compile_script(source: &str) -> Result<AST, ScriptError> {
    let engine = Engine::new();
    engine
        .compile(source)
        .map_err(|e| ScriptError::at(e.to_string(), e.position()))
}

/// Run a script against `session` on the calling thread.
///
/// Edits made before a runtime error are kept; the session is handed back
/// in whatever state the script left it.
pub fn run_script(session: &mut Session, source: &str) -> Result<ScriptOutcome, ScriptError> {
    let start = Instant::now();
    let ctx: SharedContext = Arc::new(Mutex::new(ScriptContext {
        session: std::mem::take(session),
        console_output: Vec::new(),
    }));

    let result = {
        let engine = create_engine(ctx.clone());
        let mut scope = Scope::new();
        engine
            .compile(source)
            .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            .and_then(|ast| {
                engine
                    .run_ast_with_scope(&mut scope, &ast)
                    .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            })
    };

    let mut lock = lock(&ctx);
    *session = std::mem::take(&mut lock.session);
    let console_output = std::mem::take(&mut lock.console_output);
    drop(lock);

    match result {
        Ok(()) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            log_info!("Script finished in {}ms", elapsed_ms);
            Ok(ScriptOutcome { console_output, elapsed_ms })
        }
        Err(e) => {
            log_err!("Script failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn drag_draws_and_undo_reverts() {
        let mut s = Session::default();
        run_script(&mut s, r##"tool("pen"); color("#ff0000"); drag(10, 10, 60, 10);"##).unwrap();
        assert_eq!(s.canvas().committed.get_pixel(30, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(s.history().len(), 2);

        run_script(&mut s, "undo();").unwrap();
        assert!(s.canvas().committed.is_blank());
    }

    #[test]
    fn print_is_captured() {
        let mut s = Session::default();
        let out = run_script(&mut s, r#"print(`${width()}x${height()}`); print(can_undo());"#).unwrap();
        assert_eq!(out.console_output, vec!["595x842", "false"]);
    }

    #[test]
    fn float_and_int_coordinates() {
        let mut s = Session::default();
        run_script(&mut s, "down(5, 5.5); move_to(20.0, 5); up();").unwrap();
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn unknown_layout_reports_known_names() {
        let mut s = Session::default();
        let err = run_script(&mut s, "layout(\"poster\");").unwrap_err();
        assert!(err.message.contains("Unknown layout"));
        assert!(err.friendly_message().contains("Known layouts"));
    }

    #[test]
    fn up_without_down_is_a_runtime_error() {
        let mut s = Session::default();
        let err = run_script(&mut s, "up();").unwrap_err();
        assert!(err.message.contains("No drawing gesture"));
        assert!(err.friendly_message().contains("down(x, y)"));
    }

    #[test]
    fn edits_before_an_error_are_kept() {
        let mut s = Session::default();
        let id = s.id;
        let _ = run_script(&mut s, "tool(\"fill\"); click(1, 1); up();");
        assert_eq!(s.id, id);
        assert!(!s.canvas().committed.is_blank());
    }

    #[test]
    fn syntax_error_has_position() {
        let err = compile_script("let x = ;").unwrap_err();
        assert!(err.line.is_some());
        assert!(err.friendly_message().starts_with("Error on line 1"));
    }

    #[test]
    fn runaway_loop_is_stopped() {
        let mut s = Session::default();
        let err = run_script(&mut s, "loop { }").unwrap_err();
        assert!(err.friendly_message().contains("operation limit"));
    }

    #[test]
    fn pixel_query_and_swatches() {
        let mut s = Session::default();
        let out = run_script(
            &mut s,
            r##"tool("fill"); color(swatch(1)); click(0, 0); let p = pixel(3, 3); print(p[1]); print(history_len());"##,
        )
        .unwrap();
        assert_eq!(out.console_output, vec!["255", "2"]);
    }
}
