//! Loop cutting integration tests
//!
//! Searches loop points in an item, cuts it through a `MemoryHost` and checks
//! the edit order, crossfade limits and the resulting loop region.
//!
//! Run with:
//! ```bash
//! cargo test -p samplekit --test loop_integration
//! ```

#[path = "helpers/mod.rs"]
mod helpers;

use approx::assert_abs_diff_eq;
use helpers::tolerances::*;
use helpers::{buffer, generate_noise, generate_sine, init_tracing};
use samplekit::prelude::*;
use samplekit::slicer::HostOp;
use samplekit::{FadeShape, LoopSlicerSettings};

const SR: u32 = 8000;

/// 100 Hz tone whose length is not a whole number of periods, so the tail
/// window lands short of the item end and leaves room for a crossfade.
fn tone_host() -> MemoryHost {
    MemoryHost::new(buffer(generate_sine(100.0, SR, 2 * SR as usize + 37), SR))
}

fn loop_session_with(settings: LoopSlicerSettings) -> AudioSession {
    AudioSession::builder()
        .instrument("flute")
        .loop_search(LoopSearchConfig {
            corr_window_secs: 0.01,
            slide_window_secs: 0.02,
            ..LoopSearchConfig::default()
        })
        .loop_slicer(settings)
        .build()
        .expect("Failed to create session")
}

fn loop_session() -> AudioSession {
    loop_session_with(LoopSlicerSettings::default())
}

#[test]
fn test_make_loop_creates_loop_region() {
    init_tracing();
    let session = loop_session();
    let mut host = tone_host();
    let item = host.items()[0];

    let found = session.find_loop(&host.load_audio(item).unwrap()).unwrap();
    let region = session.make_loop(&mut host, item).unwrap();

    assert_eq!(region.articulation, "loop");
    assert_eq!(region.name, "#");
    assert_eq!(host.loop_points(), Some(region.bounds));
    assert_abs_diff_eq!(
        region.bounds.duration(),
        found.join_seconds() - found.start_seconds(),
        epsilon = POSITION_EPSILON
    );
    assert!(region.metadata["correlation"].as_f64().unwrap() >= LoopSearchConfig::default().corr_threshold);
    assert_eq!(host.regions().unwrap().len(), 1);
}

#[test]
fn test_tail_is_cut_before_head_is_copied() {
    // shorter than the tail margin, so material remains after the crossfade
    let session = loop_session_with(LoopSlicerSettings {
        crossfade_secs: 0.001,
        ..LoopSlicerSettings::default()
    });
    let mut host = tone_host();
    let item = host.items()[0];
    let region = session.make_loop(&mut host, item).unwrap();
    let crossfade = region.metadata["crossfade"].as_f64().unwrap();
    assert!(crossfade > 0.0);

    let log = host.log();
    let copy_at = log
        .iter()
        .position(|op| matches!(op, HostOp::Copy { .. }))
        .expect("head copy issued");
    match &log[0] {
        HostOp::Split { item: split, .. } => assert_eq!(*split, item),
        other => panic!("expected the tail split first, got {:?}", other),
    }
    assert!(matches!(log[1], HostOp::Delete { .. }));
    assert!(copy_at > 1);
}

#[test]
fn test_crossfade_never_exceeds_margin() {
    let session = loop_session_with(LoopSlicerSettings {
        crossfade_secs: 0.5,
        ..LoopSlicerSettings::default()
    });
    let mut host = tone_host();
    let item = host.items()[0];
    let item_end = host.item_bounds(item).unwrap().end();

    let found = session.find_loop(&host.load_audio(item).unwrap()).unwrap();
    let margin = item_end - found.join_seconds();
    session.make_loop(&mut host, item).unwrap();

    let fades: Vec<f64> = host
        .log()
        .iter()
        .filter_map(|op| match op {
            HostOp::SetFade { fade, .. } => Some(fade.length),
            _ => None,
        })
        .collect();
    assert_eq!(fades.len(), 2);
    for length in fades {
        assert!(length <= margin + POSITION_EPSILON, "fade {} exceeds margin {}", length, margin);
        assert!(length < 0.5);
    }
}

#[test]
fn test_rendered_loop_has_no_click_at_seam() {
    let session = loop_session();
    let mut host = tone_host();
    let item = host.items()[0];
    let found = session.find_loop(&host.load_audio(item).unwrap()).unwrap();
    session.make_loop(&mut host, item).unwrap();

    // the head copy starts at the join and fades in over the main part
    let rendered = host.render().unwrap();
    let seam = rendered.secs_to_samples(found.join_seconds());
    let around = &rendered.samples()[seam.saturating_sub(200)..(seam + 200).min(rendered.len())];
    // a 100 Hz sine at 8 kHz moves at most ~0.08 per sample
    assert!(helpers::max_step(around) < 0.25);
    helpers::assert_has_audio(around, 0.3);
}

#[test]
fn test_window_off_the_period_joins_in_phase() {
    // 150 Hz at 8 kHz: the 80-sample window spans 1.5 periods
    let session = loop_session_with(LoopSlicerSettings {
        crossfade_secs: 0.01,
        fade_shape: FadeShape::Linear,
        ..LoopSlicerSettings::default()
    });
    let mut host = MemoryHost::new(buffer(generate_sine(150.0, SR, 2 * SR as usize + 37), SR));
    let item = host.items()[0];
    let found = session.find_loop(&host.load_audio(item).unwrap()).unwrap();
    assert_eq!(found.window, 80);
    session.make_loop(&mut host, item).unwrap();

    let rendered = host.render().unwrap();
    let seam = rendered.secs_to_samples(found.join_seconds());
    let around = &rendered.samples()[seam - 200..seam + 200];
    // the clean tone moves at most ~0.12 per sample
    assert!(helpers::max_step(around) < 0.2, "click of {}", helpers::max_step(around));
    helpers::assert_has_audio(around, 0.3);
}

#[test]
fn test_no_loop_leaves_project_untouched() {
    let session = loop_session();
    let mut host = MemoryHost::new(buffer(generate_noise(2 * SR as usize, 11), SR));
    let item = host.items()[0];

    let err = session.make_loop(&mut host, item).unwrap_err();
    assert!(err.is_loop_not_found());
    assert!(host.log().is_empty());
    assert_eq!(host.loop_points(), None);
}
