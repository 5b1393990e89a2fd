//! Frame sequencing as seen by a renderer.
//!
//! Run with: cargo test --test frame_loop

use raymarcher::feedback::FeedbackPair;
use raymarcher::{Engine, EngineConfig, FramePlan, FrameStep};

fn engine() -> Engine {
    Engine::new(EngineConfig { palette_seed: Some(21), ..Default::default() })
}

/// Buffer bookkeeping of one executed plan: (pass, read id, write id).
struct Trace {
    uv: FeedbackPair<u32>,
    main: FeedbackPair<u32>,
    passes: Vec<(FrameStep, u32, u32)>,
}

impl Trace {
    fn new() -> Self {
        Self {
            uv: FeedbackPair::new(0, 1),
            main: FeedbackPair::new(2, 3),
            passes: Vec::new(),
        }
    }

    fn run(&mut self, plan: &FramePlan) {
        for step in plan {
            match step {
                FrameStep::UvPass => self.passes.push((*step, *self.uv.read(), *self.uv.write())),
                FrameStep::MainPass => self.passes.push((*step, *self.main.read(), *self.main.write())),
                FrameStep::SwapUv => self.uv.swap(),
                FrameStep::SwapMain => self.main.swap(),
                FrameStep::PresentUv | FrameStep::PostChain => {}
            }
        }
    }
}

#[test]
fn test_uv_pass_precedes_main_pass() {
    let mut e = engine();
    let plan = e.advance_frame(0.016);
    let pos = |s: FrameStep| plan.steps.iter().position(|x| *x == s).unwrap();
    assert!(pos(FrameStep::UvPass) < pos(FrameStep::SwapUv));
    assert!(pos(FrameStep::SwapUv) < pos(FrameStep::MainPass));
    assert!(pos(FrameStep::MainPass) < pos(FrameStep::SwapMain));
    assert!(pos(FrameStep::SwapMain) < pos(FrameStep::PostChain));
}

#[test]
fn test_read_never_aliases_write_over_many_frames() {
    let mut e = engine();
    let mut trace = Trace::new();
    for frame in 0..50 {
        if frame == 20 {
            e.toggle_pause();
        }
        if frame == 25 {
            e.toggle_pause();
        }
        let plan = e.advance_frame(1.0 / 60.0);
        trace.run(&plan);
    }
    assert!(!trace.passes.is_empty());
    for (step, read, write) in &trace.passes {
        assert_ne!(read, write, "{:?} sampled its own target", step);
    }
    // Each pass reads what the previous pass of the same loop wrote.
    for kind in [FrameStep::UvPass, FrameStep::MainPass] {
        let passes: Vec<_> = trace.passes.iter().filter(|p| p.0 == kind).collect();
        for pair in passes.windows(2) {
            assert_eq!(pair[1].1, pair[0].2);
        }
    }
}

#[test]
fn test_pause_presents_without_advancing() {
    let mut e = engine();
    e.advance_frame(0.1);
    let time = e.time();
    let frames = e.frame_count();
    let integrators = e.integrators.clone();

    e.toggle_pause();
    for _ in 0..10 {
        let plan = e.advance_frame(0.1);
        assert_eq!(plan.steps, vec![FrameStep::PostChain]);
    }
    assert_eq!(e.time(), time);
    assert_eq!(e.frame_count(), frames);
    assert_eq!(e.integrators, integrators);

    e.set_debug_uv(true);
    assert_eq!(e.advance_frame(0.1).steps, vec![FrameStep::PresentUv]);
}

#[test]
fn test_continuous_edits_never_rebuild() {
    let mut e = engine();
    let generation = e.program().generation;
    let source = e.program().source.clone();

    for (i, name) in ["twist", "box_size", "spin", "feedback_opacity", "color_intensity", "fractal_drift_x"]
        .iter()
        .enumerate()
    {
        assert!(e.set_float(name, 0.1 * (i + 1) as f32), "{}", name);
        assert!(!e.rebuild_if_needed(false));
        e.advance_frame(1.0 / 60.0);
    }
    assert_eq!(e.program().generation, generation);
    assert_eq!(e.program().source, source);
}

#[test]
fn test_discrete_edits_always_rebuild() {
    let mut e = engine();
    for (name, value) in [("shape_type", 3.0), ("shape_mode", 2.0), ("crunch_type", 4.0), ("color_type", 6.0), ("sdf_effect_type", 1.0), ("displacement_type", 2.0)] {
        let generation = e.program().generation;
        assert!(e.set_float(name, value));
        assert!(e.rebuild_if_needed(false), "{}", name);
        assert_eq!(e.program().generation, generation + 1);
    }
}
