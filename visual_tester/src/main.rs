use anyhow::{Context, Result, anyhow};
use dichroma_vision::{
    DisplayFrame, DisplaySink, Frame, FrameProcessor, LivePipeline, Orientation, PipelineConfig, PixelFormat,
    RawFrame, SelectorControl, TransformSelector,
};
use futures::SinkExt;
use futures::channel::mpsc;
use opencv::{
    core::{self, Mat, Point, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::env;
use std::ops::ControlFlow;
use std::thread;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

const WINDOW_NAME: &str = "dichroma_vision";
const DEFAULT_FPS: f64 = 30.0;
const KEY_ESCAPE: i32 = 27;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: visual_tester <input_video_path | camera_index> [output_video_path]");
        println!("  DV_FILTER=protanopia|deuteranopia|tritanopia|normal  (default: protanopia)");
        println!("  DV_ORIENTATION=up|right|down|left                   (default: up)");
        println!("  In the preview window, keys 0-3 switch the filter and q/Esc quits.");
        return Ok(());
    }
    let input = &args[1];
    let output_path = args.get(2).cloned();

    let initial_selector = match env::var("DV_FILTER") {
        Ok(value) => value.parse::<TransformSelector>().map_err(|e| anyhow!(e))?,
        Err(_) => TransformSelector::default(),
    };
    let sensor_orientation = match env::var("DV_ORIENTATION") {
        Ok(value) => parse_orientation(&value)?,
        Err(_) => Orientation::Up,
    };

    // --- 2. Video I/O Initialization ---
    let mut cap = open_capture(input)?;
    let fps = match cap.get(videoio::CAP_PROP_FPS)? {
        fps if fps > 0.0 => fps,
        _ => DEFAULT_FPS,
    };

    // --- 3. Pipeline Initialization ---
    let config = PipelineConfig {
        sensor_orientation,
        initial_selector,
        ..PipelineConfig::default()
    };
    info!("Starting with {} ({:?}), {} render threads", initial_selector, sensor_orientation, config.worker_threads);
    let processor = FrameProcessor::new(config);
    let selector = processor.selector_control();

    // --- 4. Capture Thread (frame source) ---
    let (mut tx, rx) = mpsc::channel::<RawFrame>(1);
    let capture = thread::spawn(move || -> Result<()> {
        let mut frame = Mat::default();
        while cap.read(&mut frame)? {
            if frame.empty() {
                break;
            }
            // Capture delivers BGR; the pipeline works on BGRA like a camera buffer.
            let mut bgra = Mat::default();
            imgproc::cvt_color(&frame, &mut bgra, imgproc::COLOR_BGR2BGRA, 0)?;
            let raw = RawFrame::new(
                bgra.data_bytes()?.to_vec(),
                bgra.cols() as u32,
                bgra.rows() as u32,
                PixelFormat::Bgra8,
            );
            if futures::executor::block_on(tx.send(raw)).is_err() {
                // Pipeline stopped.
                break;
            }
        }
        Ok(())
    });

    // --- 5. Presentation ---
    let live = LivePipeline::spawn(processor, rx);
    match output_path {
        Some(path) => {
            let mut sink = VideoFileSink::new(path, fps);
            live.present_into(&mut sink).await;
        }
        None => {
            let mut sink = WindowSink::new(selector)?;
            live.present_into(&mut sink).await;
        }
    }

    let processor = live.finish().await?;
    capture
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))??;

    info!("Processing complete: {}", processor.stats());
    Ok(())
}

/// Opens a camera when `input` is a number, a video file otherwise.
fn open_capture(input: &str) -> Result<VideoCapture> {
    let cap = match input.parse::<i32>() {
        Ok(index) => VideoCapture::new(index, videoio::CAP_ANY)?,
        Err(_) => VideoCapture::from_file(input, videoio::CAP_ANY)?,
    };
    if !cap.is_opened()? {
        return Err(anyhow!("Error opening video source {}", input));
    }
    Ok(cap)
}

fn parse_orientation(value: &str) -> Result<Orientation> {
    match value.trim().to_ascii_lowercase().as_str() {
        "up" | "0" => Ok(Orientation::Up),
        "right" | "90" => Ok(Orientation::Right),
        "down" | "180" => Ok(Orientation::Down),
        "left" | "270" => Ok(Orientation::Left),
        other => Err(anyhow!("unknown orientation '{}'", other)),
    }
}

/// Converts an upright frame into a BGR `Mat` for OpenCV output.
fn to_bgr_mat(frame: &Frame) -> Result<Mat> {
    let (mat_type, code) = match frame.format() {
        PixelFormat::Bgra8 => (core::CV_8UC4, imgproc::COLOR_BGRA2BGR),
        PixelFormat::Rgba8 => (core::CV_8UC4, imgproc::COLOR_RGBA2BGR),
        PixelFormat::Rgb8 => (core::CV_8UC3, imgproc::COLOR_RGB2BGR),
    };
    let mut packed =
        Mat::new_rows_cols_with_default(frame.height() as i32, frame.width() as i32, mat_type, Scalar::all(0.0))?;
    packed.data_bytes_mut()?.copy_from_slice(frame.as_bytes());

    let mut bgr = Mat::default();
    imgproc::cvt_color(&packed, &mut bgr, code, 0)?;
    Ok(bgr)
}

/// Writes every presented frame to a video file. The writer is created on the first
/// frame, once the upright output size is known.
struct VideoFileSink {
    path: String,
    fps: f64,
    writer: Option<VideoWriter>,
}

impl VideoFileSink {
    fn new(path: String, fps: f64) -> Self {
        Self { path, fps, writer: None }
    }

    fn write(&mut self, frame: DisplayFrame) -> Result<()> {
        let bgr = to_bgr_mat(&frame.into_upright()?)?;
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => {
                let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
                let writer = VideoWriter::new(&self.path, fourcc, self.fps, bgr.size()?, true)?;
                info!("Writing output to {}", self.path);
                self.writer.insert(writer)
            }
        };
        writer.write(&bgr)?;
        Ok(())
    }
}

impl DisplaySink for VideoFileSink {
    fn present(&mut self, frame: DisplayFrame) -> ControlFlow<()> {
        match self.write(frame) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                warn!("Error writing frame: {:?}", e);
                ControlFlow::Break(())
            }
        }
    }
}

/// Shows frames in a window and doubles as the filter control: keys 0-3 pick a filter.
struct WindowSink {
    selector: SelectorControl,
}

impl WindowSink {
    fn new(selector: SelectorControl) -> Result<Self> {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { selector })
    }

    fn show(&mut self, frame: DisplayFrame) -> Result<ControlFlow<()>> {
        let label = frame.applied.name();
        let mut bgr = to_bgr_mat(&frame.into_upright()?)?;
        imgproc::put_text(
            &mut bgr,
            label,
            Point::new(10, 30),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.8,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            false,
        )?;
        highgui::imshow(WINDOW_NAME, &bgr)?;

        let key = highgui::wait_key(1)?;
        match key {
            k if (i32::from(b'0')..=i32::from(b'3')).contains(&k) => {
                self.selector.set_index((k - i32::from(b'0')) as u8);
            }
            k if k == i32::from(b'q') || k == KEY_ESCAPE => return Ok(ControlFlow::Break(())),
            _ => {}
        }
        Ok(ControlFlow::Continue(()))
    }
}

impl DisplaySink for WindowSink {
    fn present(&mut self, frame: DisplayFrame) -> ControlFlow<()> {
        self.show(frame).unwrap_or_else(|e| {
            warn!("Error displaying frame: {:?}", e);
            ControlFlow::Break(())
        })
    }
}
