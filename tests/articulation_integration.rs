//! Articulation integration tests
//!
//! Runs the built-in sustain and shorts strategies, and a custom one, by name
//! through an `AudioSession` against a `MemoryHost`.
//!
//! Run with:
//! ```bash
//! cargo test -p samplekit --test articulation_integration
//! ```

#[path = "helpers/mod.rs"]
mod helpers;

use helpers::tolerances::SILENCE_THRESHOLD;
use helpers::{
    assert_silence, buffer, generate_plucks, generate_sustain, init_tracing, test_session,
    TEST_SAMPLE_RATE,
};
use samplekit::prelude::*;
use samplekit::slicer::{HostOp, RegionContents, SliceContext, WildcardValues};
use samplekit::{Articulation, Error, Wildcard};

/// Sustained 220 Hz note followed by a decaying release take.
fn sustain_and_release_host() -> (MemoryHost, ItemId, ItemId) {
    let sr = 8000;
    let mut samples = generate_sustain(220.0, sr, 0.5, 1.0);
    samples.extend((0..sr as usize).map(|i| {
        let t = i as f32 / sr as f32;
        0.4 * (1.0 - t) * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
    }));
    samples.extend(helpers::generate_silence(sr as usize / 2));

    let mut host = MemoryHost::empty(buffer(samples, sr));
    let sustain = host.insert_item(0.0, 0.0, 2.0).unwrap();
    let release = host.insert_item(2.0, 2.0, 1.5).unwrap();
    (host, sustain, release)
}

fn fade_count(host: &MemoryHost) -> usize {
    host.log()
        .iter()
        .filter(|op| matches!(op, HostOp::SetFade { .. }))
        .count()
}

#[test]
fn test_sustain_and_release_regions() {
    init_tracing();
    let session = test_session("cello");
    let (mut host, sustain, release) = sustain_and_release_host();
    // half a second of silence leads into the note
    assert_silence(&host.source().samples()[..4000], SILENCE_THRESHOLD);

    let written = session
        .run_articulation(&mut host, "sustain", &metadata! {}, "sus", vec![sustain])
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].name, "cello_sustain_sus_ff_A3");
    assert_eq!(written[0].text("root"), Some("A3"));
    assert!(written[0].bounds.start() > 0.2);
    assert!(host.markers().iter().any(|(_, name)| name == "@sus_hard"));

    let written = session
        .run_articulation(&mut host, "sustain", &metadata! {}, "release_region", vec![release])
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].name, "cello_sustain_rls_ff_A3");
    assert_eq!(written[0].text("part"), Some("release"));
    assert!(written[0].bounds.start() > 2.0 && written[0].bounds.end() <= 3.5);

    let fades_before = fade_count(&host);
    let none = session
        .run_articulation(&mut host, "sustain", &metadata! {}, "fade_releases", Vec::new())
        .unwrap();
    assert!(none.is_empty());
    assert_eq!(fade_count(&host), fades_before + 1);
}

#[test]
fn test_release_without_sustain_fails() {
    let session = AudioSession::default();
    let (mut host, _, release) = sustain_and_release_host();
    let result =
        session.run_articulation(&mut host, "sustain", &metadata! {}, "release_cut", vec![release]);
    assert!(matches!(
        result,
        Err(Error::Slicer(samplekit::slicer::Error::MissingMetadata(_)))
    ));
}

#[test]
fn test_shorts_round_robins() {
    let session = AudioSession::builder()
        .instrument("guitar")
        .region_mask(RegionMask::new("$instrument,$articulation,$rr,$root", "_"))
        .build()
        .unwrap();
    let audio = buffer(
        generate_plucks(440.0, TEST_SAMPLE_RATE, 3.5, &[0.5, 1.5, 2.5]),
        TEST_SAMPLE_RATE,
    );
    let mut host = MemoryHost::new(audio);
    let params = metadata! { "articulation" => "pick", "pre_max" => 0.1, "wait" => 0.5 };

    let items = host.items();
    let cut = session
        .run_articulation(&mut host, "shorts", &params, "cut", items)
        .unwrap();
    assert!(cut.is_empty());
    assert_eq!(host.items().len(), 3);

    let items = host.items();
    let written = session
        .run_articulation(&mut host, "shorts", &params, "regions", items)
        .unwrap();
    let names: Vec<_> = written.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["guitar_pick_1_A4", "guitar_pick_2_A4", "guitar_pick_3_A4"]);
    for pair in written.windows(2) {
        assert!(!pair[0].bounds.overlaps(&pair[1].bounds));
    }
}

#[test]
fn test_unknown_action_is_rejected() {
    let session = AudioSession::default();
    let (mut host, sustain, _) = sustain_and_release_host();
    let result = session.run_articulation(&mut host, "shorts", &metadata! {}, "legato", vec![sustain]);
    assert!(matches!(
        result,
        Err(Error::Slicer(samplekit::slicer::Error::Articulation(_)))
    ));
    assert!(host.log().is_empty());
}

/// One region over all target items.
struct WholeTake {
    part: String,
}

impl Articulation for WholeTake {
    fn name(&self) -> &str {
        "whole"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["region"]
    }

    fn read(
        &self,
        ctx: &mut SliceContext<'_>,
        action: &str,
    ) -> samplekit::slicer::Result<Option<Vec<RegionContents>>> {
        if action != "region" {
            return Ok(None);
        }
        let mut wildcards = WildcardValues::new();
        wildcards.set(Wildcard::Part, self.part.as_str());
        Ok(Some(vec![RegionContents {
            wildcards,
            bounds: ctx.bounds()?,
            label: "whole take".into(),
            metadata: metadata! { "part" => self.part.as_str() },
        }]))
    }
}

#[test]
fn test_custom_articulation_registered_at_startup() {
    let session = AudioSession::builder()
        .instrument("harp")
        .region_mask(RegionMask::new("$instrument,$part", "-"))
        .build()
        .unwrap();
    session.registry().register("whole", |params| {
        let part = samplekit::slicer::articulation::get_param_or(
            params,
            "part",
            "take".to_string(),
            |v| v.as_str().map(str::to_string),
        )?;
        Ok(Box::new(WholeTake { part }))
    });

    let (mut host, sustain, release) = sustain_and_release_host();
    let written = session
        .run_articulation(&mut host, "whole", &metadata! { "part" => "gliss" }, "region", vec![sustain, release])
        .unwrap();
    assert_eq!(written[0].name, "harp-gliss");
    assert_eq!(written[0].articulation, "whole");
    assert_eq!(written[0].bounds, RegionBounds::new(0.0, 3.5).unwrap());
}
