use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver};
use opencv::core::{Mat, Point, Rect, Scalar};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use tracing::{debug, info};

use rust_monovo::capture::CameraCapture;
use rust_monovo::odometry::CycleReport;
use rust_monovo::session::{SessionConfig, VoSession};
use rust_monovo::viz::{MatSurface, ViewEvent};

const VIEW_WINDOW: &str = "camera";
const MAP_WINDOW: &str = "map";
/// At most this many feature markers are drawn per frame.
const MAX_OVERLAY_FEATURES: usize = 800;

#[derive(Parser, Debug)]
#[command(version, about = "Monocular visual odometry with an interactive map view")]
struct Cli {
    /// Video file to play instead of a live camera.
    #[arg(long)]
    video: Option<String>,
    /// Camera index for live capture.
    #[arg(long, default_value_t = 0)]
    camera: i32,
    /// Requested capture width.
    #[arg(long, default_value_t = 640)]
    width: i32,
    /// Requested capture height.
    #[arg(long, default_value_t = 480)]
    height: i32,
    /// ORB feature budget per frame.
    #[arg(long, default_value_t = 1200)]
    features: i32,
    /// Map canvas size (square).
    #[arg(long, default_value_t = 640)]
    map_size: i32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut capture = match &cli.video {
        Some(path) => CameraCapture::open_file(path)?,
        None => CameraCapture::open_camera(cli.camera, cli.width, cli.height)?,
    };
    let (frame_width, frame_height) = capture.probe()?;

    let config = SessionConfig {
        frame_width,
        frame_height,
        n_features: cli.features,
        ..Default::default()
    };
    let mut session = VoSession::new(&config)?;
    let mut surface = MatSurface::new(cli.map_size, cli.map_size)?;

    highgui::named_window(VIEW_WINDOW, highgui::WINDOW_AUTOSIZE)?;
    highgui::named_window(MAP_WINDOW, highgui::WINDOW_AUTOSIZE)?;
    let view_events = install_mouse_handler()?;

    session.start(&mut capture)?;
    info!("keys: q/Esc quit, r reset world, v reset view, m toggle map mode");

    // One odometry + render cycle per tick. The stop flag is observed here at
    // loop head only; an in-flight cycle always completes.
    while session.is_running() {
        for event in view_events.try_iter() {
            session.handle_view_event(event);
        }

        match session.cycle(&mut capture)? {
            Some(report) => {
                let mut display = capture.color().try_clone()?;
                draw_feature_overlay(&mut display, &session, &report)?;
                highgui::imshow(VIEW_WINDOW, &display)?;
            }
            None => {
                // Dropped tick. A dried-up video file ends the session.
                if cli.video.is_some() {
                    info!("end of video");
                    session.stop();
                } else {
                    debug!("no frame this tick");
                }
            }
        }

        session.render(&mut surface)?;
        highgui::imshow(MAP_WINDOW, surface.mat())?;

        let key = highgui::wait_key(1)?;
        match key {
            k if k == 'q' as i32 || k == 27 => session.stop(),
            k if k == 'r' as i32 => session.reset_world(),
            k if k == 'v' as i32 => session.reset_view(),
            k if k == 'm' as i32 => {
                session.toggle_map_mode();
            }
            _ => {}
        }
    }

    Ok(())
}

/// Route HighGUI mouse input into view events. The callback owns the drag
/// state; the session loop drains the channel once per tick.
fn install_mouse_handler() -> Result<Receiver<ViewEvent>> {
    let (tx, rx) = unbounded();
    let mut last: Option<(i32, i32)> = None;
    highgui::set_mouse_callback(
        MAP_WINDOW,
        Some(Box::new(move |event, x, y, flags| match event {
            highgui::EVENT_LBUTTONDOWN => last = Some((x, y)),
            highgui::EVENT_LBUTTONUP => last = None,
            highgui::EVENT_MOUSEMOVE => {
                if let Some((px, py)) = last {
                    let pan = (flags & highgui::EVENT_FLAG_CTRLKEY) != 0;
                    let _ = tx.send(ViewEvent::Drag {
                        dx: f64::from(x - px),
                        dy: f64::from(y - py),
                        pan,
                    });
                    last = Some((x, y));
                }
            }
            highgui::EVENT_MOUSEWHEEL => {
                let delta = highgui::get_mouse_wheel_delta(flags).unwrap_or(0);
                if delta != 0 {
                    let _ = tx.send(ViewEvent::Wheel {
                        notches: delta.signum(),
                    });
                }
            }
            _ => {}
        })),
    )?;
    Ok(rx)
}

/// Strided feature markers plus a one-line status, drawn over the live view.
fn draw_feature_overlay(display: &mut Mat, session: &VoSession, report: &CycleReport) -> Result<()> {
    if let Some(keypoints) = session.last_keypoints() {
        let stride = (keypoints.len() / MAX_OVERLAY_FEATURES).max(1);
        for kp in keypoints.iter().step_by(stride) {
            let p = kp.pt();
            imgproc::rectangle(
                display,
                Rect::new(p.x as i32 - 1, p.y as i32 - 1, 3, 3),
                Scalar::new(160.0, 255.0, 120.0, 0.0),
                imgproc::FILLED,
                imgproc::LINE_8,
                0,
            )?;
        }
    }
    imgproc::put_text(
        display,
        &session.summary(report),
        Point::new(12, 22),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        Scalar::new(255.0, 255.0, 255.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}
