use image::Rgba;
use sketchpad::canvas::{Layout, LayoutKind, PixelBuffer, TRANSPARENT};
use sketchpad::components::history::{CanvasSnapshot, HistoryManager};
use sketchpad::ops::fill::{FillThresholds, flood_fill};
use sketchpad::ops::raster::{circle_points, line_points};
use sketchpad::settings::SketchSettings;
use sketchpad::{Session, SessionEvent, Tool};

fn stroke(s: &mut Session, from: (f32, f32), to: (f32, f32)) {
    s.pointer_down(from.0, from.1);
    s.pointer_move(to.0, to.1).unwrap();
    s.pointer_up().unwrap();
}

fn tagged(tag: u8) -> CanvasSnapshot {
    let mut buf = PixelBuffer::new(2, 2);
    buf.put_pixel(1, 1, Rgba([tag, tag, tag, 255]));
    CanvasSnapshot::from_buffer(&buf, format!("{tag}"))
}

#[test]
fn history_keeps_only_the_most_recent_snapshots() {
    let limit = 4;
    let mut h = HistoryManager::new(limit);
    h.initialize(tagged(0));
    for tag in 1..=10 {
        h.push(tagged(tag));
    }
    assert_eq!(h.len(), limit);

    // Walk back down: 10, 9, 8 are restorable, then the floor (7) holds.
    let mut seen = vec![h.current().unwrap().description().to_string()];
    while let Some(s) = h.undo() {
        seen.push(s.description().to_string());
    }
    assert_eq!(seen, vec!["10", "9", "8", "7"]);
}

#[test]
fn session_history_respects_configured_depth() {
    let settings = SketchSettings { max_undo_steps: 3, ..Default::default() };
    let mut s = Session::new(settings);
    s.select_tool(Tool::FillBucket);
    for (i, hex) in ["#110000", "#220000", "#330000", "#440000", "#550000"].iter().enumerate() {
        s.set_color_hex(hex);
        s.pointer_down(i as f32, 0.0);
    }
    assert_eq!(s.history().len(), 3);
    assert!(s.undo());
    assert!(s.undo());
    assert!(!s.undo());
    assert_eq!(s.canvas().committed.get_pixel(0, 0), Rgba([0x33, 0, 0, 255]));
}

#[test]
fn undo_then_redo_is_pixel_exact() {
    let mut s = Session::default();
    s.set_color_hex("#3366cc");
    s.set_opacity(0.6);
    s.select_tool(Tool::WaterBrush);
    stroke(&mut s, (20.0, 40.0), (200.0, 90.0));
    s.select_tool(Tool::Oval);
    stroke(&mut s, (50.0, 50.0), (150.0, 120.0));
    let before = s.canvas().committed.clone();

    assert!(s.undo());
    assert_ne!(s.canvas().committed, before);
    assert!(s.redo());
    assert_eq!(s.canvas().committed, before);
}

#[test]
fn new_edit_after_undo_discards_redo() {
    let mut s = Session::default();
    stroke(&mut s, (10.0, 10.0), (90.0, 10.0));
    assert!(s.undo());
    assert!(s.can_redo());
    stroke(&mut s, (10.0, 50.0), (90.0, 50.0));
    assert!(!s.can_redo());
    assert!(!s.redo());
}

#[test]
fn undo_at_floor_changes_nothing() {
    let mut s = Session::default();
    let before = s.canvas().committed.clone();
    s.drain_events();
    assert!(!s.undo());
    assert_eq!(s.canvas().committed, before);
    assert_eq!(s.history().len(), 1);
    assert!(s.drain_events().is_empty());
}

#[test]
fn refilling_a_region_with_its_own_colour_is_a_no_op() {
    let mut buf = PixelBuffer::new_filled(30, 30, Rgba([40, 80, 120, 255]));
    buf.fill_rect(5, 5, 10, 10, [200, 0, 0], 1.0);
    let before = buf.clone();
    assert_eq!(flood_fill(&mut buf, 8, 8, [200, 0, 0], FillThresholds::default()), 0);
    assert_eq!(buf, before);
}

#[test]
fn fill_stays_inside_an_enclosed_rectangle() {
    let mut buf = PixelBuffer::new(40, 40);
    // 1-px black frame from (10,10) to (29,29)
    buf.fill_rect(10, 10, 20, 1, [0, 0, 0], 1.0);
    buf.fill_rect(10, 29, 20, 1, [0, 0, 0], 1.0);
    buf.fill_rect(10, 10, 1, 20, [0, 0, 0], 1.0);
    buf.fill_rect(29, 10, 1, 20, [0, 0, 0], 1.0);

    let filled = flood_fill(&mut buf, 20, 20, [0, 200, 0], FillThresholds::default());
    assert_eq!(filled, 18 * 18);
    for y in 0..40 {
        for x in 0..40 {
            let inside = (11..29).contains(&x) && (11..29).contains(&y);
            let p = buf.get_pixel(x, y);
            if inside {
                assert_eq!(p, Rgba([0, 200, 0, 255]));
            } else {
                assert_ne!(p, Rgba([0, 200, 0, 255]), "leaked to ({x}, {y})");
            }
        }
    }
}

#[test]
fn lattice_points_for_canonical_inputs() {
    assert_eq!(line_points(0, 0, 40, 0, 10), vec![(0, 0), (10, 0), (20, 0), (30, 0), (40, 0)]);
    assert_eq!(circle_points(7, 9, 0), vec![(7, 9)]);
}

#[test]
fn stroke_undo_redo_scenario() {
    let mut s = Session::default();
    s.clear();
    let floor = s.canvas().committed.clone();
    assert!(floor.is_blank());

    stroke(&mut s, (30.0, 30.0), (120.0, 80.0));
    assert_eq!(s.history().len(), 2);
    let drawn = s.canvas().committed.clone();
    assert!(!drawn.is_blank());

    s.undo();
    assert_eq!(s.canvas().committed, floor);
    s.redo();
    assert_eq!(s.canvas().committed, drawn);
}

#[test]
fn fill_on_blank_covers_everything_in_one_snapshot() {
    let mut s = Session::default();
    s.select_tool(Tool::FillBucket);
    s.set_color_hex("#C0FFEE");
    s.pointer_down(300.0, 400.0);
    assert!(!s.is_drawing());
    assert_eq!(s.history().len(), 2);
    let c = Rgba([0xC0, 0xFF, 0xEE, 255]);
    assert!(s.canvas().committed.as_image().pixels().all(|p| *p == c));
}

#[test]
fn pixel_art_layout_forces_pen_and_blocks_shapes() {
    let mut s = Session::default();
    assert!(s.select_tool(Tool::Pentagon));
    s.set_layout(LayoutKind::EightBit);
    assert_eq!(s.tool(), Tool::Pen);
    for t in Tool::all().iter().filter(|t| t.shape_kind().is_some()) {
        assert!(!s.select_tool(*t), "{t:?} should be unavailable");
    }
    assert_eq!(s.tool(), Tool::Pen);
}

#[test]
fn shape_preview_never_touches_committed_buffer() {
    let mut s = Session::default();
    s.select_tool(Tool::Rect);
    s.pointer_down(20.0, 20.0);
    for i in 0..10 {
        s.pointer_move(40.0 + i as f32 * 10.0, 60.0).unwrap();
        assert!(s.canvas().committed.is_blank());
        assert!(s.canvas().has_draft());
    }
    s.pointer_up().unwrap();
    assert!(!s.canvas().has_draft());
    assert!(!s.canvas().committed.is_blank());
    assert_eq!(s.history().len(), 2);
}

#[test]
fn selection_leaves_no_history_and_no_pixels() {
    let mut s = Session::default();
    s.select_tool(Tool::Marquee);
    s.pointer_down(10.0, 10.0);
    s.pointer_move(100.0, 100.0).unwrap();
    assert!(!s.compose().pixels().all(|p| *p == TRANSPARENT));
    s.pointer_up().unwrap();
    assert_eq!(s.history().len(), 1);
    assert!(s.canvas().committed.is_blank());
}

#[test]
fn leaving_the_canvas_commits_the_gesture() {
    let mut s = Session::default();
    s.select_tool(Tool::Line);
    s.pointer_down(10.0, 10.0);
    s.pointer_move(80.0, 80.0).unwrap();
    s.pointer_leave();
    assert!(!s.is_drawing());
    assert_eq!(s.history().len(), 2);
    assert!(!s.canvas().committed.is_blank());
}

#[test]
fn eraser_clears_to_transparent() {
    let mut s = Session::default();
    s.select_tool(Tool::FillBucket);
    s.pointer_down(0.0, 0.0);
    s.select_tool(Tool::Eraser);
    s.set_thickness(10);
    stroke(&mut s, (100.0, 100.0), (200.0, 100.0));
    assert_eq!(s.canvas().committed.get_pixel(150, 100), TRANSPARENT);
    assert_eq!(s.canvas().committed.get_pixel(150, 300), Rgba([0, 0, 0, 255]));
    assert_eq!(s.history().len(), 3);
}

#[test]
fn seeded_spray_is_reproducible() {
    let run = || {
        let mut s = Session::default();
        s.seed_rng(42);
        s.select_tool(Tool::SprayPaint);
        s.pointer_down(100.0, 100.0);
        for i in 0..5 {
            s.pointer_move(100.0 + i as f32 * 4.0, 100.0).unwrap();
        }
        s.pointer_up().unwrap();
        s.canvas().committed.clone()
    };
    let a = run();
    assert!(!a.is_blank());
    assert_eq!(a, run());
}

#[test]
fn layout_change_resets_canvas_and_history() {
    let mut s = Session::default();
    stroke(&mut s, (10.0, 10.0), (50.0, 50.0));
    s.drain_events();
    s.set_layout(LayoutKind::Landscape);
    assert_eq!((s.width(), s.height()), (842, 595));
    assert!(s.canvas().committed.is_blank());
    assert_eq!(s.history().len(), 1);
    let events = s.drain_events();
    assert!(events.contains(&SessionEvent::LayoutChanged(LayoutKind::Landscape)));
    assert!(events.contains(&SessionEvent::HistoryChanged { can_undo: false, can_redo: false }));
    assert_eq!(*s.layout(), Layout::new(LayoutKind::Landscape, false));
}
