use crate::camera::VideoSource;
use crate::common::config::CameraConfig;
use crate::common::error::{EnrollError, Result};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use std::fs;

/// Device index that requests IR camera auto-detection.
pub const AUTO_DETECT_INDEX: u32 = 999;

pub struct Camera {
    device: Device,
    index: u32,
    config: CameraConfig,
}

/// Open mmap stream on a camera. Acts as the live [`VideoSource`] during capture.
pub struct CameraSession<'a> {
    camera: &'a Camera,
    stream: v4l::io::mmap::Stream<'a>,
    format: v4l::Format,
}

/// One `/dev/video*` node found while scanning.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
    pub features: Vec<String>,
    pub likely_ir: bool,
}

fn video_indices() -> Result<Vec<u32>> {
    let mut indices = Vec::new();
    for entry in fs::read_dir("/dev")? {
        let entry = entry?;
        let path = entry.path();
        let filename = path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");

        if let Some(index) = filename.strip_prefix("video").and_then(|s| s.parse::<u32>().ok()) {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Ok(indices)
}

fn is_grayscale(fourcc: &FourCC) -> bool {
    fourcc.repr == *b"GREY" || fourcc.repr == *b"Y8  " || fourcc.repr == *b"Y16 "
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let device_index = if config.device_index == AUTO_DETECT_INDEX {
            Self::detect_ir_camera()?
        } else {
            config.device_index
        };
        Self::new_with_device(device_index, config.clone())
    }

    /// List all available cameras with their capabilities
    pub fn list_all_cameras() -> Result<Vec<CameraInfo>> {
        let mut cameras = Vec::new();

        for index in video_indices()? {
            let Ok(device) = Device::new(index as usize) else { continue };
            let Ok(caps) = device.query_caps() else { continue };

            let mut features = Vec::new();
            let mut likely_ir = false;

            if caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                features.push("VIDEO_CAPTURE".to_string());
            } else if caps.capabilities.contains(v4l::capability::Flags::META_CAPTURE) {
                features.push("METADATA_CAPTURE".to_string());
            }

            for fmt in device.enum_formats().unwrap_or_default() {
                let fourcc_str = fmt.fourcc.str().unwrap_or("UNKNOWN").to_string();
                if is_grayscale(&fmt.fourcc) {
                    features.push(format!("Grayscale ({})", fourcc_str));
                    likely_ir = true;
                } else if fourcc_str == "MJPG" || fourcc_str == "YUYV" {
                    features.push(format!("Color ({})", fourcc_str));
                }
            }

            if caps.card.contains("IR") || caps.card.contains("Infrared") {
                likely_ir = true;
            }

            cameras.push(CameraInfo { index, name: caps.card.clone(), features, likely_ir });
        }

        Ok(cameras)
    }

    /// Auto-detect IR camera by looking for devices with grayscale format
    pub fn detect_ir_camera() -> Result<u32> {
        let candidate = Self::list_all_cameras()?
            .into_iter()
            .filter(|c| c.features.iter().any(|f| f == "VIDEO_CAPTURE"))
            .max_by_key(|c| {
                // Grayscale formats beat name hints; ties go to the lower index
                let score = if c.features.iter().any(|f| f.starts_with("Grayscale")) {
                    100
                } else if c.likely_ir {
                    50
                } else {
                    0
                };
                (score, std::cmp::Reverse(c.index))
            });

        match candidate {
            Some(camera) => {
                tracing::info!("Selected camera: /dev/video{} ({})", camera.index, camera.name);
                Ok(camera.index)
            }
            None => {
                tracing::warn!("No capture device detected, falling back to /dev/video0");
                Ok(0)
            }
        }
    }

    pub fn new_with_device(index: u32, config: CameraConfig) -> Result<Self> {
        tracing::info!("Opening camera device {}", index);

        let device = Device::new(index as usize)
            .map_err(|e| EnrollError::Camera(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| EnrollError::Camera(format!("Failed to query capabilities: {}", e)))?;

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            tracing::warn!("Device {} may not support standard video capture: {:?}", index, caps.capabilities);
        }

        let mut fmt = device.format()
            .map_err(|e| EnrollError::Camera(format!("Failed to get format: {}", e)))?;

        fmt.width = config.width;
        fmt.height = config.height;

        // Keep grayscale for IR cameras, otherwise ask for MJPG
        if !is_grayscale(&fmt.fourcc) {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        // Don't fail if the exact resolution isn't supported
        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let final_fmt = device.format()
            .map_err(|e| EnrollError::Camera(format!("Failed to get final format: {}", e)))?;

        if final_fmt.width != config.width || final_fmt.height != config.height {
            tracing::warn!(
                "Camera resolution {}x{} differs from requested {}x{}",
                final_fmt.width, final_fmt.height, config.width, config.height
            );
        }

        Ok(Self { device, index, config })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Open a stream and run the warmup frames.
    pub fn start_session(&self) -> Result<CameraSession<'_>> {
        let format = self.device.format()
            .map_err(|e| EnrollError::Camera(format!("Failed to get format: {}", e)))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(&self.device, Type::VideoCapture, 8)
            .map_err(|e| EnrollError::Camera(format!("Failed to create stream: {}", e)))?;

        tracing::debug!("Warming up camera ({} frames)", self.config.warmup_frames);
        for i in 0..self.config.warmup_frames {
            stream.next()
                .map_err(|e| EnrollError::Camera(format!("Failed to capture warmup frame {}: {}", i, e)))?;
            std::thread::sleep(std::time::Duration::from_millis(self.config.warmup_delay_ms));
        }

        Ok(CameraSession {
            camera: self,
            stream,
            format,
        })
    }

    /// One-off capture, used to check a device works.
    pub fn capture_frame(&self) -> Result<DynamicImage> {
        self.start_session()?.capture_frame()
    }

    fn decode(&self, data: &[u8], format: &v4l::Format) -> Result<DynamicImage> {
        if is_grayscale(&format.fourcc) {
            let expected = (format.width * format.height) as usize;
            let pixels = data.get(..expected)
                .ok_or_else(|| EnrollError::Camera("Short grayscale frame".into()))?;
            let img_buffer = ImageBuffer::<Luma<u8>, _>::from_raw(format.width, format.height, pixels.to_vec())
                .ok_or_else(|| EnrollError::Camera("Failed to create grayscale image buffer".into()))?;
            return Ok(DynamicImage::ImageLuma8(img_buffer));
        }

        if format.fourcc.repr == *b"MJPG" {
            return Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?);
        }

        Err(EnrollError::Camera(format!(
            "Unsupported format on device {}: {}",
            self.index,
            format.fourcc.str().unwrap_or("UNKNOWN")
        )))
    }
}

impl<'a> CameraSession<'a> {
    pub fn capture_frame(&mut self) -> Result<DynamicImage> {
        let (buf, meta) = self.stream.next()
            .map_err(|e| EnrollError::Camera(format!("Failed to capture: {}", e)))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used == 0 { buf } else { &buf[..used] };
        self.camera.decode(data, &self.format)
    }
}

impl<'a> VideoSource for CameraSession<'a> {
    type Frame = DynamicImage;

    fn try_snapshot(&mut self) -> Option<DynamicImage> {
        match self.capture_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::debug!("Snapshot skipped: {}", e);
                None
            }
        }
    }
}
