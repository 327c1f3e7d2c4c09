mod common;

use image::{DynamicImage, Rgb};

use common::{photo, photo_png, pipeline_with, ramp_pipeline, step_pipeline, StepDepth, PAINT};
use spatialscene::image::decode_data_uri;
use spatialscene::pipeline::{Config, InpaintConfig, InpaintMode};
use spatialscene::Error;

#[test]
fn depth_map_matches_input_size() {
    let pipeline = ramp_pipeline();
    for (w, h) in [(64, 48), (37, 23), (1, 1), (5, 90)] {
        let image = DynamicImage::ImageRgb8(photo(w, h));
        let output = pipeline.run(&image, false).expect("pipeline run");
        assert_eq!(output.depth.dimensions(), (w, h));
        assert_eq!(output.inpainted_depth.dimensions(), (w, h));
        assert_eq!(output.inpainted_image.dimensions(), (w, h));
    }
}

#[test]
fn depth_map_spans_full_byte_range() {
    let pipeline = ramp_pipeline();
    let image = DynamicImage::ImageRgb8(photo(80, 60));
    let depth = pipeline.run(&image, false).unwrap().depth;

    let min = depth.pixels().map(|p| p[0]).min().unwrap();
    let max = depth.pixels().map(|p| p[0]).max().unwrap();
    assert_eq!((min, max), (0, 255));
}

#[test]
fn disabled_inpainting_passes_through() {
    let pipeline = step_pipeline();
    let image = DynamicImage::ImageRgb8(photo(64, 48));

    let plain = pipeline.run(&image, false).unwrap();
    let inpainted = pipeline.run(&image, true).unwrap();

    assert_eq!(plain.inpainted_image, plain.original);
    assert_eq!(plain.inpainted_depth, plain.depth);
    assert!(plain.mask.is_none());
    assert_eq!(plain.depth, inpainted.depth);
}

#[test]
fn mask_driven_inpainting_touches_only_masked_pixels() {
    let pipeline = step_pipeline();
    let image = DynamicImage::ImageRgb8(photo(64, 48));
    let output = pipeline.run(&image, true).unwrap();
    let mask = output.mask.expect("mask mode builds a mask");

    assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
    assert!(mask.pixels().any(|p| p[0] == 255));

    for (x, y, m) in mask.enumerate_pixels() {
        let painted = output.inpainted_image.get_pixel(x, y);
        if m[0] == 255 {
            assert_eq!(painted, &PAINT);
        } else {
            assert_eq!(painted, output.original.get_pixel(x, y));
            assert_eq!(
                output.inpainted_depth.get_pixel(x, y),
                output.depth.get_pixel(x, y)
            );
        }
    }
}

#[test]
fn whole_image_mode_regenerates_photo_and_keeps_depth() {
    let config = Config {
        inpaint: InpaintConfig {
            mode: InpaintMode::Whole,
            ..InpaintConfig::default()
        },
        ..Config::default()
    };
    let pipeline = pipeline_with(config, StepDepth);
    let image = DynamicImage::ImageRgb8(photo(32, 32));
    let output = pipeline.run(&image, true).unwrap();

    assert!(output.inpainted_image.pixels().all(|p| *p == PAINT));
    assert_eq!(output.inpainted_depth, output.depth);
    assert!(output.mask.is_none());
}

#[test]
fn process_embeds_three_png_data_uris() {
    let pipeline = step_pipeline();
    let processed = pipeline.process(&photo_png(40, 30), true).unwrap();

    assert_eq!((processed.width, processed.height), (40, 30));
    for uri in [
        &processed.original_image,
        &processed.depth_map,
        &processed.inpainted_image,
    ] {
        assert!(uri.starts_with("data:image/png;base64,"));
        let decoded = decode_data_uri(uri).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    let original = decode_data_uri(&processed.original_image).unwrap().to_rgb8();
    assert_eq!(original.get_pixel(0, 0), &Rgb([0, 0, 90]));
}

#[test]
fn process_without_inpainting_returns_original_twice() {
    let pipeline = ramp_pipeline();
    let processed = pipeline.process(&photo_png(16, 16), false).unwrap();
    assert_eq!(processed.original_image, processed.inpainted_image);
}

#[test]
fn undecodable_upload_fails() {
    let pipeline = ramp_pipeline();
    let err = pipeline.process(b"definitely not an image", true).unwrap_err();
    assert!(matches!(err, Error::ImageDecode { .. }));
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = Config::default();
    config.mask.dilation_kernel = 8;
    let result = spatialscene::Pipeline::new(
        config,
        std::sync::Arc::new(common::RampDepth),
        std::sync::Arc::new(common::Paint(PAINT)),
    );
    assert!(result.is_err());
}
