//! This example shows you how to convert a camera JPEG frame into a PNG
//! file.

use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: {} <input.jpg> <output.png>", args[0]);

        return ExitCode::FAILURE;
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let data = match std::fs::read(input_path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Failed to read input file: {err}");

            return ExitCode::FAILURE;
        }
    };

    let frame = match botcam_jpeg::decode(&data) {
        Ok(frame) => frame,
        Err(err) => {
            eprintln!("Failed to decode JPEG: {err}");

            return ExitCode::FAILURE;
        }
    };

    println!(
        "Decoded: {}x{} frame, {}",
        frame.width,
        frame.height,
        if frame.is_color() { "color" } else { "grayscale" }
    );

    let Some(image) = frame.into_image() else {
        eprintln!("Internal error: buffer size mismatch");

        return ExitCode::FAILURE;
    };

    if let Err(err) = image.save(output_path) {
        eprintln!("Failed to save PNG: {err}");

        return ExitCode::FAILURE;
    }

    eprintln!("Saved: {output_path}");

    ExitCode::SUCCESS
}
