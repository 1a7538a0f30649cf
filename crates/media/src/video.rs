//! Streaming video playback
//!
//! Frames come from a [`StreamDecoder`]. The default decoder runs `ffmpeg` as
//! a child process that writes raw RGBA frames to a pipe.

use crate::{normalize_frame_rate, MediaError, MediaResult};
use image::RgbaImage;
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Source of decoded video frames
pub trait StreamDecoder {
    /// Native frame size
    fn size(&self) -> (u32, u32);

    /// Frames per second as reported by the container
    fn frame_rate(&self) -> f64;

    /// Decode the next frame, `Ok(None)` at end of stream
    fn read_frame(&mut self) -> MediaResult<Option<RgbaImage>>;

    /// Restart decoding from the first frame
    fn rewind(&mut self) -> MediaResult<()>;

    /// Free decoder resources. Must be safe to call twice.
    fn release(&mut self);
}

/// Looping playback over a decoder
pub(crate) struct VideoStream {
    decoder: Box<dyn StreamDecoder>,
    position: u64,
    // Set once a freshly rewound stream yields nothing
    exhausted: bool,
}

impl VideoStream {
    pub(crate) fn new(decoder: Box<dyn StreamDecoder>) -> Self {
        Self {
            decoder,
            position: 0,
            exhausted: false,
        }
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        self.decoder.size()
    }

    pub(crate) fn frame_rate(&self) -> f64 {
        normalize_frame_rate(self.decoder.frame_rate())
    }

    /// Index of the next frame to decode
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// Decode the next frame, wrapping to the start at end of stream.
    ///
    /// A stream with no decodable frames is released after one rewind and
    /// yields `None` from then on.
    pub(crate) fn next_frame(&mut self) -> Option<RgbaImage> {
        if self.exhausted {
            return None;
        }

        match self.decoder.read_frame() {
            Ok(Some(frame)) => {
                self.position += 1;
                return Some(frame);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, position = self.position, "video decode failed");
                return None;
            }
        }

        if let Err(e) = self.decoder.rewind() {
            tracing::warn!(error = %e, "video rewind failed");
            return None;
        }
        self.position = 0;

        match self.decoder.read_frame() {
            Ok(Some(frame)) => {
                self.position = 1;
                Some(frame)
            }
            Ok(None) => {
                tracing::warn!("video stream has no frames");
                self.exhausted = true;
                self.decoder.release();
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "video decode failed after rewind");
                None
            }
        }
    }

    pub(crate) fn release(&mut self) {
        self.decoder.release();
    }
}

/// Result of probing a video with `ffprobe`
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Deserialize, Default)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees. Newer ffprobe reports it as display
    /// matrix side data, older builds as a `rotate` tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0)
    }
}

/// Parse an ffprobe rational such as `30000/1001`. `0/0` yields 0.
pub fn parse_rate(text: &str) -> f64 {
    let text = text.trim();
    match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => text.parse().unwrap_or(0.0),
    }
}

/// Parse the JSON printed by `ffprobe -of json -show_entries stream=...`
pub fn parse_probe(json: &str) -> MediaResult<ProbeInfo> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| MediaError::Probe(e.to_string()))?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::Probe("no video stream".into()))?;

    let mut width = stream.width.unwrap_or(0);
    let mut height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::Probe("video stream has no dimensions".into()));
    }

    // ffmpeg applies the rotation, so quarter turns arrive transposed
    let quarter_turns = (stream.rotation() / 90.0).round() as i64;
    if quarter_turns.rem_euclid(2) == 1 {
        std::mem::swap(&mut width, &mut height);
    }

    let avg = stream.avg_frame_rate.as_deref().map(parse_rate).unwrap_or(0.0);
    let frame_rate = if avg > 0.0 {
        avg
    } else {
        stream.r_frame_rate.as_deref().map(parse_rate).unwrap_or(0.0)
    };

    Ok(ProbeInfo {
        width,
        height,
        frame_rate: normalize_frame_rate(frame_rate),
    })
}

#[cfg(windows)]
fn command(program: &str) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut cmd = Command::new(program);
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(windows))]
fn command(program: &str) -> Command {
    Command::new(program)
}

fn probe(path: &Path) -> MediaResult<ProbeInfo> {
    let output = command(FFPROBE)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate:stream_tags=rotate:stream_side_data=rotation",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;

    if !output.status.success() {
        return Err(MediaError::Probe(format!("ffprobe exited with {}", output.status)));
    }

    parse_probe(&String::from_utf8_lossy(&output.stdout))
}

/// Video decoder backed by an `ffmpeg` child process
pub struct FfmpegDecoder {
    path: PathBuf,
    info: ProbeInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    buffer: Vec<u8>,
}

impl FfmpegDecoder {
    /// Probe `path` and start decoding from the first frame
    pub fn open(path: &Path) -> MediaResult<Self> {
        let info = probe(path)?;
        let frame_len = info.width as usize * info.height as usize * 4;

        let mut decoder = Self {
            path: path.to_path_buf(),
            info,
            child: None,
            stdout: None,
            buffer: vec![0u8; frame_len],
        };
        decoder.spawn()?;
        Ok(decoder)
    }

    fn spawn(&mut self) -> MediaResult<()> {
        let mut child = command(FFMPEG)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        self.stdout = child.stdout.take();
        self.child = Some(child);
        tracing::debug!(path = %self.path.display(), "ffmpeg started");
        Ok(())
    }
}

impl StreamDecoder for FfmpegDecoder {
    fn size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    fn read_frame(&mut self) -> MediaResult<Option<RgbaImage>> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| MediaError::Decode("decoder released".into()))?;

        match stdout.read_exact(&mut self.buffer) {
            Ok(()) => {}
            // A truncated trailing frame counts as end of stream
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(MediaError::Decode(e.to_string())),
        }

        RgbaImage::from_raw(self.info.width, self.info.height, self.buffer.clone())
            .map(Some)
            .ok_or_else(|| MediaError::Decode("frame buffer size mismatch".into()))
    }

    fn rewind(&mut self) -> MediaResult<()> {
        self.release();
        self.spawn()
    }

    fn release(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(path = %self.path.display(), "ffmpeg released");
        }
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rational_rates() {
        assert!((parse_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25/1"), 25.0);
        assert_eq!(parse_rate("0/0"), 0.0);
        assert_eq!(parse_rate("24"), 24.0);
        assert_eq!(parse_rate("garbage"), 0.0);
    }

    #[test]
    fn parses_probe_json() {
        let json = r#"{"programs":[],"streams":[{"width":1280,"height":720,
            "r_frame_rate":"60/1","avg_frame_rate":"30/1"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.frame_rate, 30.0);
    }

    #[test]
    fn probe_falls_back_to_real_rate_then_one() {
        let json = r#"{"streams":[{"width":2,"height":2,"r_frame_rate":"12/1","avg_frame_rate":"0/0"}]}"#;
        assert_eq!(parse_probe(json).unwrap().frame_rate, 12.0);

        let json = r#"{"streams":[{"width":2,"height":2,"r_frame_rate":"0/0","avg_frame_rate":"0/0"}]}"#;
        assert_eq!(parse_probe(json).unwrap().frame_rate, 1.0);
    }

    #[test]
    fn rotated_streams_report_display_size() {
        let json = r#"{"streams":[{"width":1920,"height":1080,"avg_frame_rate":"30/1",
            "side_data_list":[{"side_data_type":"Display Matrix","rotation":-90}]}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let json = r#"{"streams":[{"width":1920,"height":1080,"avg_frame_rate":"30/1",
            "tags":{"rotate":"270"}}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let json = r#"{"streams":[{"width":1920,"height":1080,"avg_frame_rate":"30/1",
            "side_data_list":[{"rotation":180}]}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    struct Empty {
        rewinds: std::rc::Rc<std::cell::Cell<u32>>,
    }

    impl StreamDecoder for Empty {
        fn size(&self) -> (u32, u32) {
            (2, 2)
        }

        fn frame_rate(&self) -> f64 {
            30.0
        }

        fn read_frame(&mut self) -> MediaResult<Option<RgbaImage>> {
            Ok(None)
        }

        fn rewind(&mut self) -> MediaResult<()> {
            self.rewinds.set(self.rewinds.get() + 1);
            Ok(())
        }

        fn release(&mut self) {}
    }

    #[test]
    fn frameless_stream_is_rewound_only_once() {
        let rewinds = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut stream = VideoStream::new(Box::new(Empty {
            rewinds: rewinds.clone(),
        }));

        for _ in 0..30 {
            assert!(stream.next_frame().is_none());
        }
        assert_eq!(rewinds.get(), 1);
    }

    #[test]
    fn probe_without_stream_is_an_error() {
        assert!(parse_probe(r#"{"streams":[]}"#).is_err());
        assert!(parse_probe("not json").is_err());
    }
}
