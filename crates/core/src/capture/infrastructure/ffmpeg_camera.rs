use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::capture::domain::capture_device::CaptureDevice;
use crate::settings::domain::settings::Resolution;
use crate::shared::frame::{Frame, PixelFormat};

/// Where frames come from: a platform camera or a video file played back
/// at its native rate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureSource {
    Device(String),
    File(PathBuf),
}

/// Platform default camera: the first v4l2 node, the first avfoundation
/// device, or the dshow device name most laptops expose.
pub fn default_device() -> CaptureSource {
    if cfg!(target_os = "macos") {
        CaptureSource::Device("0".to_string())
    } else if cfg!(target_os = "windows") {
        CaptureSource::Device("video=Integrated Camera".to_string())
    } else {
        CaptureSource::Device("/dev/video0".to_string())
    }
}

/// Captures frames through ffmpeg-next (libavdevice + libavcodec).
///
/// Every decoded frame is scaled to the requested resolution and converted
/// to RGB24.
pub struct FfmpegCamera {
    source: CaptureSource,
    framerate: u32,
    stream: Option<OpenStream>,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
    pacer: Option<Pacer>,
}

// Safety: FfmpegCamera is owned by the capture thread and never shared.
// The raw pointers inside ffmpeg types do not escape it.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn new(source: CaptureSource) -> Self {
        Self {
            source,
            framerate: 30,
            stream: None,
        }
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate.max(1);
        self
    }

    pub fn source(&self) -> &CaptureSource {
        &self.source
    }

    fn open_input(
        &self,
        resolution: Resolution,
    ) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        match &self.source {
            CaptureSource::File(path) => Ok(ffmpeg_next::format::input(path)?),
            CaptureSource::Device(name) => {
                ffmpeg_next::device::register_all();
                let format = find_input_format()?;
                let mut options = ffmpeg_next::Dictionary::new();
                options.set("video_size", &video_size_option(resolution));
                options.set("framerate", &self.framerate.to_string());
                let ctx = ffmpeg_next::format::open_with(
                    name.as_str(),
                    &ffmpeg_next::format::Format::Input(format),
                    options,
                )?;
                Ok(ctx.input())
            }
        }
    }
}

impl CaptureDevice for FfmpegCamera {
    fn open(&mut self, resolution: Resolution) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.stream = None;

        let ictx = self.open_input(resolution)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let rate = stream.rate();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let (width, height) = resolution.dimensions();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let pacer = match self.source {
            CaptureSource::File(_) => {
                frame_interval(rate.numerator(), rate.denominator()).map(Pacer::new)
            }
            CaptureSource::Device(_) => None,
        };

        log::info!(
            "Opened {:?}: native {}x{}, delivering {resolution}",
            self.source,
            decoder.width(),
            decoder.height()
        );

        self.stream = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
            pacer,
        });
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(stream) = self.stream.as_mut() else {
            return Err("FfmpegCamera: not opened".into());
        };
        let frame = stream.next_frame()?;
        if frame.is_some() {
            if let Some(pacer) = stream.pacer.as_mut() {
                pacer.wait();
            }
        }
        Ok(frame)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

impl OpenStream {
    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;
        let pixels = copy_rows(rgb.data(0), rgb.stride(0), self.width, self.height);
        // The capture loop stamps sequence numbers.
        Ok(Some(Frame::new(pixels, self.width, self.height, PixelFormat::Rgb24, 0)))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                return self.try_receive();
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }
}

/// Holds file playback to the stream's frame rate so a file behaves like
/// a live camera.
struct Pacer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    fn wait(&mut self) {
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // Do not accumulate debt after a slow consumer.
        self.next_due = Some(due.max(now) + self.interval);
    }
}

fn find_input_format() -> Result<ffmpeg_next::format::Input, Box<dyn std::error::Error>> {
    let wanted = platform_format_names();
    ffmpeg_next::device::input::video()
        .find(|format| wanted.contains(&format.name()))
        .ok_or_else(|| format!("no capture backend available (tried {})", wanted.join(", ")).into())
}

fn platform_format_names() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &["avfoundation"]
    } else if cfg!(target_os = "windows") {
        &["dshow", "vfwcap"]
    } else {
        &["v4l2", "video4linux2"]
    }
}

fn video_size_option(resolution: Resolution) -> String {
    let (width, height) = resolution.dimensions();
    format!("{width}x{height}")
}

fn frame_interval(numerator: i32, denominator: i32) -> Option<Duration> {
    if numerator <= 0 || denominator <= 0 {
        return None;
    }
    Some(Duration::from_secs_f64(denominator as f64 / numerator as f64))
}

/// Strips per-row padding from a packed RGB plane.
fn copy_rows(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
