use std::path::Path;

use image::{Rgb, RgbImage};
use prep_core::{Modality, ModalityStatus, PipelineRunner, PipelineSettings, RunConfig};
use prep_stages::default_executors;
use prep_stages::io::read_index;
use serde_json::json;

fn write_png(path: &Path, width: u32, height: u32, shade: u8) {
    RgbImage::from_pixel(width, height, Rgb([shade, 0, 255 - shade]))
        .save(path)
        .unwrap();
}

fn run(metadata_dir: &Path, yaml: String) -> prep_core::RunOutcome {
    let runner = PipelineRunner::new(default_executors(), PipelineSettings::with_metadata_dir(metadata_dir));
    runner.run(&RunConfig::from_yaml_str(&yaml).unwrap()).unwrap()
}

#[test]
fn test_images_resize_grayscale_and_skip_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("imgs");
    std::fs::create_dir_all(&input).unwrap();
    write_png(&input.join("a.png"), 4, 2, 10);
    write_png(&input.join("b.png"), 6, 3, 200);
    std::fs::write(input.join("c.png"), b"not an image").unwrap();
    std::fs::write(input.join("notes.txt"), b"ignored").unwrap();
    let out = dir.path().join("out");

    let outcome = run(
        dir.path(),
        format!(
            "images:\n  path: {}\n  output_folder: {}\n  output_format: gif\n  preprocessing:\n    grayscale: true\n    resize:\n      width: 2\n      height: 2\n",
            input.display(),
            out.display()
        ),
    );

    let steps: Vec<_> = outcome.record.steps_for(Modality::Images).collect();
    let names: Vec<_> = steps.iter().map(|s| s.step.as_str()).collect();
    assert_eq!(names, vec!["load_images", "resize", "grayscale", "save_images"]);
    assert_eq!(steps[0].fact("files_found"), Some(&json!(3)));
    assert_eq!(steps[0].fact("frames_loaded"), Some(&json!(2)));
    assert_eq!(steps[0].warnings().len(), 1);
    assert!(steps[3].warnings()[0].contains("defaulting to png"));

    assert!(out.join("processed_img_0.png").exists());
    assert!(out.join("processed_img_1.png").exists());
    let decoded = image::open(out.join("processed_img_1.png")).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (2, 2));

    let index = read_index(&out).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index[0].filename, "processed_img_0.png");

    let summary = outcome.record.summary(Modality::Images).unwrap();
    assert_eq!(summary.status, ModalityStatus::Completed);
    assert_eq!(summary.input_shape, vec![2, 2, 4, 3]);
    assert_eq!(summary.output_shape, vec![2, 2, 2, 1]);
}

#[test]
fn test_video_frames_are_sampled() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("clip");
    std::fs::create_dir_all(&input).unwrap();
    for i in 0..7 {
        write_png(&input.join(format!("f{:02}.png", i)), 3, 3, i * 30);
    }
    let out = dir.path().join("frames");

    let outcome = run(
        dir.path(),
        format!(
            "videos:\n  path: {}\n  output_folder: {}\n  preprocessing:\n    frame_sampling:\n      every_n_frames: 3\n    normalize: true\n",
            input.display(),
            out.display()
        ),
    );

    let sampling = outcome
        .record
        .steps_for(Modality::Videos)
        .find(|s| s.step == "frame_sampling")
        .unwrap();
    assert_eq!(sampling.fact("total_frames"), Some(&json!(7)));
    assert_eq!(sampling.fact("frames_sampled"), Some(&json!(3)));

    for name in ["frame_0000.png", "frame_0001.png", "frame_0002.png"] {
        assert!(out.join(name).exists(), "{} missing", name);
    }
    assert!(!out.join("frame_0003.png").exists());

    let summary = outcome.record.summary(Modality::Videos).unwrap();
    assert_eq!(summary.facts["total_frames"], json!(7));
    assert_eq!(summary.facts["frames_saved"], json!(3));
}

#[test]
fn test_video_file_input_is_rejected_but_tabular_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let movie = dir.path().join("movie.mp4");
    std::fs::write(&movie, b"\x00\x00\x00\x18ftypmp42").unwrap();
    let table = dir.path().join("t.csv");
    std::fs::write(&table, "a\n1\n").unwrap();

    let outcome = run(
        dir.path(),
        format!(
            "tabular:\n  path: {}\n  output_folder: {}\nvideos:\n  path: {}\n  output_folder: {}\n",
            table.display(),
            dir.path().join("tab_out").display(),
            movie.display(),
            dir.path().join("vid_out").display()
        ),
    );

    assert_eq!(outcome.failed_modalities(), vec![Modality::Videos]);
    let video = outcome.record.summary(Modality::Videos).unwrap();
    assert!(video.error.as_deref().unwrap().starts_with("FORMAT/"));
    assert_eq!(
        outcome.record.summary(Modality::Tabular).unwrap().status,
        ModalityStatus::Completed
    );
}
