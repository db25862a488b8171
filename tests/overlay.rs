use civicsnap_lib::detection::DetectionState;
use civicsnap_lib::overlay::{OverlayRenderer, RETICLE_GREEN};
use civicsnap_lib::platform::simulated::test_pattern;
use civicsnap_lib::platform::Resolution;

#[test]
fn render_is_deterministic() {
    let frame = test_pattern(Resolution::new(320, 240));
    let renderer = OverlayRenderer::default();
    let detection = DetectionState::new("broken_streetlight", 0.78);

    let a = renderer.render(&frame, &detection, 320, 240);
    let b = renderer.render(&frame, &detection, 320, 240);
    assert_eq!(a.as_raw(), b.as_raw());
    // The source frame is left untouched.
    assert_eq!(frame, test_pattern(Resolution::new(320, 240)));
}

#[test]
fn reticle_centre_and_brackets_are_green() {
    let frame = test_pattern(Resolution::HD);
    let renderer = OverlayRenderer::default();
    let out = renderer.render(&frame, &DetectionState::default(), 1280, 720);

    let layout = renderer.layout(&DetectionState::default(), 1280, 720);
    let (cx, cy) = layout.center;
    let half = layout.half_size;
    assert_eq!(out.get_pixel(cx as u32, cy as u32), &RETICLE_GREEN);
    // Top-left bracket corner and the end of its horizontal arm.
    assert_eq!(out.get_pixel((cx - half) as u32, (cy - half) as u32), &RETICLE_GREEN);
    assert_eq!(
        out.get_pixel((cx - half + layout.bracket) as u32, (cy - half) as u32),
        &RETICLE_GREEN
    );
    // Away from the reticle the frame shows through.
    assert_eq!(out.get_pixel(10, 10), frame.get_pixel(10, 10));
}

#[test]
fn banner_only_drawn_when_confident() {
    let frame = test_pattern(Resolution::new(640, 360));
    let renderer = OverlayRenderer::default();

    let scanning = renderer.render(&frame, &DetectionState::new("pothole", 0.69), 640, 360);
    let detected = renderer.render(&frame, &DetectionState::new("pothole", 0.85), 640, 360);

    let (banner, text) = renderer
        .layout(&DetectionState::new("pothole", 0.85), 640, 360)
        .banner
        .expect("banner");
    assert_eq!(text, "POTHOLE (85%)");

    let (x, y) = (banner.x as u32 + 1, banner.y as u32 + 1);
    assert_eq!(scanning.get_pixel(x, y), frame.get_pixel(x, y));
    assert_ne!(detected.get_pixel(x, y), frame.get_pixel(x, y));
}
