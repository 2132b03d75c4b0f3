use crate::config::{COVER_FILE, COVER_HEIGHT, COVER_WIDTH};
use easy_error::{Error, ResultExt};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{info, warn};

const WAIFU2X_NOISE_LEVEL: u32 = 2;

lazy_static! {
    static ref WAIFU2X_SUMMARY_REGEX: Regex =
        Regex::new(r".+\s(\d+) \[files processed\], (\d+) \[files errored\].+$").unwrap();
}

/// How many times a cover has to be enlarged to reach the target size.
pub fn scale_ratio(width: u32, height: u32) -> u32 {
    let width_ratio = COVER_WIDTH / width.max(1) + 1;
    let height_ratio = COVER_HEIGHT / height.max(1) + 1;
    width_ratio.max(height_ratio)
}

/// Writes `image_bytes` as `cover.jpg` inside `novel_dir`, upscaling it through waifu2x first
/// when it is smaller than the target size.
///
/// Returns whether the stored cover went through a successful upscale
/// (`true` also when no upscale was needed). When waifu2x fails, the original image is kept.
pub fn prepare_cover(image_bytes: &[u8], novel_dir: &Path) -> Result<bool, Error> {
    let image = image::load_from_memory(image_bytes).context("Could not decode cover image")?;
    // Flattens GIF frames and alpha channels, JPEG has neither.
    let image = DynamicImage::ImageRgb8(image.to_rgb8());

    let cover_path = novel_dir.join(COVER_FILE);
    let ratio = scale_ratio(image.width(), image.height());
    if ratio < 2 {
        save_jpeg(&image, &cover_path)?;
        return Ok(true);
    }

    let tmp_path = novel_dir.join("tmp.jpg");
    save_jpeg(&image, &tmp_path)?;

    info!(ratio, "Upscaling cover");
    let upscaled = match waifu2x(&tmp_path, &cover_path, WAIFU2X_NOISE_LEVEL, ratio) {
        Ok(upscaled) => upscaled,
        Err(e) => {
            warn!("Could not run waifu2x: {e}");
            false
        }
    };

    if upscaled {
        let enlarged = image::open(&cover_path).context("Could not open upscaled cover")?;
        let resized = enlarged.resize_exact(COVER_WIDTH, COVER_HEIGHT, FilterType::Lanczos3);
        save_jpeg(&DynamicImage::ImageRgb8(resized.to_rgb8()), &cover_path)?;
        fs::remove_file(&tmp_path).context(format!("Could not remove {tmp_path:?}"))?;
    } else {
        fs::rename(&tmp_path, &cover_path).context(format!("Could not move {tmp_path:?} to {cover_path:?}"))?;
    }

    Ok(upscaled)
}

fn save_jpeg(image: &DynamicImage, path: &Path) -> Result<(), Error> {
    image
        .save_with_format(path, ImageFormat::Jpeg)
        .context(format!("Could not save image {path:?}"))
}

/// Runs the waifu2x converter on `input` and reports whether it processed the file.
pub fn waifu2x(input: &Path, output: &Path, noise: u32, scale: u32) -> Result<bool, Error> {
    let windows = cfg!(windows);
    let (program, noise_flag, scale_flag) = if windows {
        ("waifu2x-converter.exe", "--noise_level", "--scale_ratio")
    } else {
        ("waifu2x-converter-cpp", "--noise-level", "--scale-ratio")
    };

    let noise = noise.to_string();
    let scale = scale.to_string();
    let result = Command::new(program)
        .arg("-i")
        .arg(input)
        .arg("-o")
        .arg(output)
        .args(&[noise_flag, noise.as_str(), scale_flag, scale.as_str()])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context(format!("Could not run {program}"))?;

    let stdout = String::from_utf8_lossy(&result.stdout);
    let last_line = stdout.lines().last().unwrap_or("");
    if waifu2x_succeeded(last_line, windows) {
        Ok(true)
    } else {
        let stderr = String::from_utf8_lossy(&result.stderr);
        if stderr.trim().is_empty() {
            warn!("waifu2x did not process the cover: {last_line}");
        } else {
            warn!("waifu2x did not process the cover: {}", stderr.trim());
        }
        Ok(false)
    }
}

/// Interprets the summary line waifu2x prints last.
fn waifu2x_succeeded(last_line: &str, windows: bool) -> bool {
    if windows {
        return last_line == "process successfully done!";
    }
    match WAIFU2X_SUMMARY_REGEX.captures(last_line) {
        Some(captures) => &captures[1] == "1" && &captures[2] == "0",
        None => false,
    }
}

#[cfg(test)]
fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::new_rgba8(width, height);
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[test]
fn test_scale_ratio() {
    assert_eq!(1, scale_ratio(801, 1221));
    assert_eq!(2, scale_ratio(800, 1300));
    assert_eq!(3, scale_ratio(400, 610));
    assert_eq!(5, scale_ratio(300, 305));
}

#[test]
fn test_waifu2x_summary_parsing() {
    let done = "Finished processing. 1 [files processed], 0 [files errored], 0 [files skipped]";
    let errored = "Finished processing. 0 [files processed], 1 [files errored], 0 [files skipped]";

    assert!(waifu2x_succeeded(done, false));
    assert!(!waifu2x_succeeded(errored, false));
    assert!(!waifu2x_succeeded("", false));
    assert!(waifu2x_succeeded("process successfully done!", true));
    assert!(!waifu2x_succeeded("error", true));
}

#[test]
fn test_large_cover_is_stored_without_upscale() {
    let dir = tempfile::tempdir().unwrap();

    let upscaled = prepare_cover(&encode_png(801, 1221), dir.path()).unwrap();

    assert!(upscaled);
    assert!(!dir.path().join("tmp.jpg").exists());
    let stored = image::open(dir.path().join(COVER_FILE)).unwrap();
    assert_eq!((801, 1221), (stored.width(), stored.height()));
}
