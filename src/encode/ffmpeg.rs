use std::io::{Read, Write as _};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::OnceLock;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::thread::JoinHandle;

use crate::encode::session::{EncoderBackend, EncoderSession, SessionConfig, VideoCodec};
use crate::foundation::error::{DataraceError, DataraceResult};
use crate::foundation::math::flatten_premul_over_bg;
use crate::render::surface::FrameRGBA;

const STDOUT_CHUNK_BYTES: usize = 64 * 1024;

/// Encoder backed by the system `ffmpeg` binary, producing WebM on stdout.
#[derive(Debug)]
pub struct FfmpegEncoder {
    program: String,
    encoders: OnceLock<Option<String>>,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEncoder {
    /// Use `program` (a name on `PATH` or a path) as the ffmpeg binary.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            encoders: OnceLock::new(),
        }
    }

    fn encoder_list(&self) -> Option<&str> {
        self.encoders
            .get_or_init(|| {
                let out = Command::new(&self.program)
                    .args(["-hide_banner", "-encoders"])
                    .stdin(Stdio::null())
                    .stderr(Stdio::null())
                    .output()
                    .ok()?;
                if !out.status.success() {
                    return None;
                }
                Some(String::from_utf8_lossy(&out.stdout).into_owned())
            })
            .as_deref()
    }

    fn codec_args(codec: VideoCodec) -> &'static [&'static str] {
        match codec {
            VideoCodec::Vp9 => &["-c:v", "libvpx-vp9", "-deadline", "realtime", "-cpu-used", "8"],
            VideoCodec::Vp8 => &["-c:v", "libvpx", "-deadline", "realtime", "-cpu-used", "8"],
            VideoCodec::EncoderDefault => &[],
        }
    }
}

/// `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn lists_encoder(list: &str, name: &str) -> bool {
    // Lines look like ` V....D libvpx-vp9           libvpx VP9 (codec vp9)`.
    list.lines()
        .filter_map(|l| l.split_whitespace().nth(1))
        .any(|n| n == name)
}

impl EncoderBackend for FfmpegEncoder {
    fn is_available(&self) -> bool {
        self.encoder_list().is_some()
    }

    fn supports_codec(&self, codec: VideoCodec) -> bool {
        let Some(list) = self.encoder_list() else {
            return false;
        };
        match codec {
            VideoCodec::Vp9 => lists_encoder(list, "libvpx-vp9"),
            VideoCodec::Vp8 => lists_encoder(list, "libvpx"),
            VideoCodec::EncoderDefault => true,
        }
    }

    #[tracing::instrument(skip(self), fields(program = %self.program))]
    fn start_session(&mut self, cfg: &SessionConfig) -> DataraceResult<Box<dyn EncoderSession>> {
        cfg.validate()?;

        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Input: raw RGBA8 frames, already flattened to opaque in push_frame.
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
        ]);
        cmd.args(Self::codec_args(cfg.codec));
        cmd.args(["-pix_fmt", "yuv420p", "-f", "webm", "pipe:1"]);

        let mut child = cmd.spawn().map_err(|e| {
            DataraceError::encoder_start(format!(
                "failed to spawn {} (is it installed and on PATH?): {e}",
                self.program
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DataraceError::encoder_start("failed to open ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DataraceError::encoder_start("failed to open ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DataraceError::encoder_start("failed to open ffmpeg stderr"))?;

        let (tx, rx) = channel::<Vec<u8>>();
        let stdout_reader = std::thread::spawn(move || -> std::io::Result<()> {
            let mut buf = vec![0u8; STDOUT_CHUNK_BYTES];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    return Ok(());
                }
                if tx.send(buf[..n].to_vec()).is_err() {
                    return Ok(());
                }
            }
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::info!(codec = ?cfg.codec, w = cfg.width, h = cfg.height, "ffmpeg session started");
        Ok(Box::new(FfmpegSession {
            scratch: vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4],
            cfg: cfg.clone(),
            child,
            stdin: Some(stdin),
            chunks: rx,
            stdout_reader: Some(stdout_reader),
            stderr_drain: Some(stderr_drain),
        }))
    }
}

struct FfmpegSession {
    cfg: SessionConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    chunks: Receiver<Vec<u8>>,
    stdout_reader: Option<JoinHandle<std::io::Result<()>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
}

impl EncoderSession for FfmpegSession {
    fn codec(&self) -> VideoCodec {
        self.cfg.codec
    }

    fn push_frame(&mut self, frame: &FrameRGBA) -> DataraceResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(DataraceError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(DataraceError::encode(
                "frame.data size mismatch with width*height*4",
            ));
        }

        if frame.premultiplied {
            flatten_premul_over_bg(&mut self.scratch, &frame.data, self.cfg.background_rgb);
        } else {
            self.scratch.copy_from_slice(&frame.data);
            for px in self.scratch.chunks_exact_mut(4) {
                px[3] = 255;
            }
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(DataraceError::encode("ffmpeg session is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            DataraceError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn try_recv_chunk(&mut self) -> Option<Vec<u8>> {
        match self.chunks.try_recv() {
            Ok(chunk) => Some(chunk),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn stop(mut self: Box<Self>) -> DataraceResult<Vec<Vec<u8>>> {
        drop(self.stdin.take());

        let status = self.child.wait().map_err(|e| {
            DataraceError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if let Some(handle) = self.stdout_reader.take() {
            handle
                .join()
                .map_err(|_| DataraceError::encode("ffmpeg stdout reader thread panicked"))?
                .map_err(|e| DataraceError::encode(format!("ffmpeg stdout read failed: {e}")))?;
        }
        let rest: Vec<Vec<u8>> = self.chunks.try_iter().collect();

        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DataraceError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| DataraceError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(DataraceError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        tracing::debug!(tail_chunks = rest.len(), "ffmpeg session stopped");
        Ok(rest)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
