//! Camera access through nokhwa.
//!
//! `nokhwa::Camera` is not `Send` on every backend, so each device gets a
//! worker thread that creates and owns the camera. The handle talks to it
//! over channels and converts the decoded RGBA frames into BGRA with the
//! configured flips, so the pin sees a device that natively emits BGRA.

use crate::errors::{PinError, Result};
use crate::platform::DeviceHandle;
use crate::types::PixelLayout;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

enum Command {
    Init {
        width: u32,
        height: u32,
        fps: u32,
        reply: Sender<bool>,
    },
    Start,
    Stop,
    Read {
        len: usize,
        reply: Sender<Result<Vec<u8>>>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct Geometry {
    width: u32,
    height: u32,
    flip_horizontal: bool,
    flip_vertical: bool,
}

/// List cameras visible to nokhwa. Query failures yield an empty list.
pub fn list_devices() -> Vec<Arc<dyn DeviceHandle>> {
    let cameras = match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras,
        Err(e) => {
            log::debug!("Camera query failed, treating as no devices: {}", e);
            return Vec::new();
        }
    };

    log::debug!("Found {} cameras", cameras.len());
    cameras
        .into_iter()
        .filter_map(|info| {
            match NokhwaDevice::spawn(info.index().clone(), info.human_name()) {
                Ok(device) => Some(Arc::new(device) as Arc<dyn DeviceHandle>),
                Err(e) => {
                    log::warn!("Skipping camera {}: {}", info.human_name(), e);
                    None
                }
            }
        })
        .collect()
}

/// A nokhwa camera driven from its own worker thread.
pub struct NokhwaDevice {
    name: String,
    commands: Sender<Command>,
    geometry: Mutex<Geometry>,
    stopped: AtomicBool,
}

impl NokhwaDevice {
    pub fn spawn(index: CameraIndex, name: String) -> Result<Self> {
        let (commands, inbox) = unbounded();
        let thread_name = format!("crabeye-camera-{:?}", index);
        std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || camera_worker(index, inbox))
            .map_err(|e| PinError::device(format!("spawn failed: {e}")))?;

        Ok(Self {
            name,
            commands,
            geometry: Mutex::new(Geometry::default()),
            stopped: AtomicBool::new(true),
        })
    }

    fn geometry(&self) -> Geometry {
        self.geometry.lock().map(|g| *g).unwrap_or_default()
    }
}

impl DeviceHandle for NokhwaDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn init(&self, width: u32, height: u32, fps: u32, layout: PixelLayout) -> bool {
        if layout != PixelLayout::Bgra32 {
            log::warn!("{} only emits BGRA32, not {}", self.name, layout.as_str());
            return false;
        }

        let (reply, answer) = bounded(1);
        let sent = self.commands.send(Command::Init {
            width,
            height,
            fps,
            reply,
        });
        if sent.is_err() {
            return false;
        }

        let ok = answer.recv().unwrap_or(false);
        if ok {
            if let Ok(mut g) = self.geometry.lock() {
                g.width = width;
                g.height = height;
            }
        }
        ok
    }

    fn set_flip(&self, horizontal: bool, vertical: bool) {
        if let Ok(mut g) = self.geometry.lock() {
            g.flip_horizontal = horizontal;
            g.flip_vertical = vertical;
        }
    }

    fn set_autogain(&self, enabled: bool) {
        // nokhwa leaves gain to the driver default, which is automatic
        log::debug!("{}: autogain={} (driver managed)", self.name, enabled);
    }

    fn set_auto_white_balance(&self, enabled: bool) {
        log::debug!("{}: auto white balance={} (driver managed)", self.name, enabled);
    }

    fn start(&self) {
        self.stopped.store(false, Ordering::SeqCst);
        let _ = self.commands.send(Command::Start);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.commands.send(Command::Stop);
    }

    fn read_frame(&self, buffer: &mut [u8]) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(PinError::device("device is stopped"));
        }

        let geometry = self.geometry();
        let len = geometry.width as usize * geometry.height as usize * 4;
        if buffer.len() < len {
            return Err(PinError::invalid_buffer(format!(
                "{} bytes offered, frame needs {}",
                buffer.len(),
                len
            )));
        }

        let (reply, answer) = bounded(1);
        self.commands
            .send(Command::Read { len, reply })
            .map_err(|_| PinError::device("camera worker has exited"))?;
        let rgba = answer
            .recv()
            .map_err(|_| PinError::device("camera worker has exited"))??;

        rgba_to_bgra(&rgba, &mut buffer[..len], geometry);
        Ok(())
    }
}

fn rgba_to_bgra(src: &[u8], dst: &mut [u8], geometry: Geometry) {
    let width = geometry.width as usize;
    let height = geometry.height as usize;
    let stride = width * 4;

    for (y, src_row) in src.chunks_exact(stride).take(height).enumerate() {
        let dst_y = if geometry.flip_vertical { height - 1 - y } else { y };
        let dst_row = &mut dst[dst_y * stride..(dst_y + 1) * stride];
        for (x, px) in src_row.chunks_exact(4).enumerate() {
            let dst_x = if geometry.flip_horizontal { width - 1 - x } else { x };
            let out = &mut dst_row[dst_x * 4..dst_x * 4 + 4];
            out[0] = px[2];
            out[1] = px[1];
            out[2] = px[0];
            out[3] = px[3];
        }
    }
}

fn open_camera(index: &CameraIndex, width: u32, height: u32, fps: u32) -> Result<nokhwa::Camera> {
    let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
        CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps),
    ));

    let camera = nokhwa::Camera::new(index.clone(), requested)
        .map_err(|e| PinError::DeviceInitFailed(e.to_string()))?;

    let actual = camera.resolution();
    if actual.width() != width || actual.height() != height {
        return Err(PinError::DeviceInitFailed(format!(
            "camera opened at {}x{}, requested {}x{}",
            actual.width(),
            actual.height(),
            width,
            height
        )));
    }
    Ok(camera)
}

fn camera_worker(index: CameraIndex, inbox: Receiver<Command>) {
    let mut camera: Option<nokhwa::Camera> = None;

    for command in inbox.iter() {
        match command {
            Command::Init {
                width,
                height,
                fps,
                reply,
            } => {
                camera = None;
                let ok = match open_camera(&index, width, height, fps) {
                    Ok(opened) => {
                        log::info!("Camera {:?} opened at {}x{}@{}", index, width, height, fps);
                        camera = Some(opened);
                        true
                    }
                    Err(e) => {
                        log::warn!("Camera {:?} failed to open: {}", index, e);
                        false
                    }
                };
                let _ = reply.send(ok);
            }
            Command::Start => {
                if let Some(camera) = camera.as_mut() {
                    if let Err(e) = camera.open_stream() {
                        log::error!("Camera {:?} failed to start: {}", index, e);
                    }
                }
            }
            Command::Stop => {
                if let Some(camera) = camera.as_mut() {
                    if let Err(e) = camera.stop_stream() {
                        log::debug!("Camera {:?} stop: {}", index, e);
                    }
                }
            }
            Command::Read { len, reply } => {
                let result = match camera.as_mut() {
                    Some(camera) => {
                        let mut data = vec![0u8; len];
                        camera
                            .write_frame_to_buffer::<RgbAFormat>(&mut data)
                            .map(|_| data)
                            .map_err(|e| PinError::device(e.to_string()))
                    }
                    None => Err(PinError::device("camera not initialized")),
                };
                let _ = reply.send(result);
            }
        }
    }

    log::debug!("Camera worker {:?} exiting", index);
}
