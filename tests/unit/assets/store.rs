use super::*;

#[test]
fn prepared_image_checks_length() {
    assert!(PreparedImage::new(2, 2, vec![0u8; 15]).is_err());
    assert!(PreparedImage::new(0, 2, vec![]).is_err());
    let img = PreparedImage::solid(2, 3, [1, 2, 3, 255]).unwrap();
    assert_eq!(img.rgba8_premul.len(), 24);
    assert_eq!(&img.rgba8_premul[20..24], &[1, 2, 3, 255]);
}

#[test]
fn text_layout_smoke_with_system_font_if_present() {
    let Some(files) = crate::assets::fonts::FontFiles::discover() else {
        return;
    };
    let font_bytes = files.load().unwrap().regular;

    let mut engine = TextLayoutEngine::new();
    let face = engine.register_font(font_bytes, false).unwrap();
    assert!(!face.family.trim().is_empty());

    let layout = engine
        .layout_line(
            "2,910",
            &face,
            30.0,
            TextBrushRgba8 {
                r: 255,
                g: 255,
                b: 255,
                a: 255,
            },
        )
        .unwrap();
    assert!(layout.lines().next().is_some());
    assert!(layout.width() > 0.0);
}

#[test]
fn register_font_rejects_garbage() {
    let mut engine = TextLayoutEngine::new();
    assert!(engine.register_font(vec![0u8; 16], false).is_err());
}
