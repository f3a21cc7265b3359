//! Sprite decoding: every frame of a GIF composited onto a full RGBA canvas.
//!
//! The `gif` crate hands back frames as patches over the logical screen.
//! [`GifAnimation::decode`] applies each patch and its disposal so the UI
//! can upload any frame as a texture on its own.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use gif::{ColorOutput, DecodeOptions, DisposalMethod};
use thiserror::Error;

/// Delays below this are treated as "unspecified" and shown for
/// [`DEFAULT_DELAY_MS`], like most viewers do.
const MIN_DELAY_MS: u32 = 20;
const DEFAULT_DELAY_MS: u32 = 100;

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("sprite asset not found: {0}")]
    Missing(String),

    #[error("invalid GIF: {0}")]
    Decode(#[from] gif::DecodingError),

    #[error("GIF has no frames")]
    Empty,

    #[error("failed to read sprite asset: {0}")]
    Io(#[from] std::io::Error),
}

/// One composited frame: `width * height * 4` bytes of unpremultiplied RGBA.
#[derive(Debug, Clone)]
pub struct GifFrame {
    pub delay_ms: u32,
    pub rgba: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct GifAnimation {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<GifFrame>,
}

impl GifAnimation {
    pub fn open(path: &Path) -> Result<Self, SpriteError> {
        if !path.exists() {
            return Err(SpriteError::Missing(path.display().to_string()));
        }
        Self::decode(BufReader::new(File::open(path)?))
    }

    pub fn decode<R: Read>(reader: R) -> Result<Self, SpriteError> {
        let mut options = DecodeOptions::new();
        options.set_color_output(ColorOutput::RGBA);
        let mut decoder = options.read_info(reader)?;
        let screen = (usize::from(decoder.width()), usize::from(decoder.height()));

        let mut canvas: Option<Canvas> = None;
        let mut frames = Vec::new();

        while let Some(frame) = decoder.read_next_frame()? {
            let canvas = canvas.get_or_insert_with(|| {
                let (w, h) = screen;
                // A zero-sized logical screen borrows the first frame's extent.
                if w == 0 || h == 0 {
                    Canvas::new(
                        usize::from(frame.left) + usize::from(frame.width),
                        usize::from(frame.top) + usize::from(frame.height),
                    )
                } else {
                    Canvas::new(w, h)
                }
            });

            let patch = Patch {
                left: usize::from(frame.left),
                top: usize::from(frame.top),
                width: usize::from(frame.width),
                height: usize::from(frame.height),
            };
            let saved = (frame.dispose == DisposalMethod::Previous).then(|| canvas.pixels.clone());

            canvas.blit(&patch, &frame.buffer);

            let delay = u32::from(frame.delay) * 10;
            frames.push(GifFrame {
                delay_ms: if delay >= MIN_DELAY_MS { delay } else { DEFAULT_DELAY_MS },
                rgba: Arc::from(canvas.pixels.as_slice()),
            });

            match frame.dispose {
                DisposalMethod::Background => canvas.clear(&patch),
                DisposalMethod::Previous => {
                    if let Some(pixels) = saved {
                        canvas.pixels = pixels;
                    }
                }
                _ => {}
            }
        }

        let Some(canvas) = canvas else {
            return Err(SpriteError::Empty);
        };
        Ok(Self {
            width: canvas.width as u32,
            height: canvas.height as u32,
            frames,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

struct Patch {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
        }
    }

    /// Copy opaque pixels of `rgba` onto the canvas, clipped to its bounds.
    fn blit(&mut self, patch: &Patch, rgba: &[u8]) {
        for y in 0..patch.height {
            let cy = patch.top + y;
            if cy >= self.height {
                break;
            }
            for x in 0..patch.width {
                let cx = patch.left + x;
                if cx >= self.width {
                    break;
                }
                let src = (y * patch.width + x) * 4;
                let Some(px) = rgba.get(src..src + 4) else {
                    return;
                };
                if px[3] == 0 {
                    continue;
                }
                let dst = (cy * self.width + cx) * 4;
                self.pixels[dst..dst + 4].copy_from_slice(px);
            }
        }
    }

    fn clear(&mut self, patch: &Patch) {
        for cy in patch.top..(patch.top + patch.height).min(self.height) {
            for cx in patch.left..(patch.left + patch.width).min(self.width) {
                let dst = (cy * self.width + cx) * 4;
                self.pixels[dst..dst + 4].fill(0);
            }
        }
    }
}

/// A solid-colour patch for [`synth_gif`]; `delay` is in centiseconds.
#[cfg(test)]
pub(crate) struct SynthFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub rgba: [u8; 4],
    pub delay: u16,
    pub dispose: DisposalMethod,
}

#[cfg(test)]
impl SynthFrame {
    pub(crate) fn solid(width: u16, height: u16, rgba: [u8; 4], delay: u16) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
            rgba,
            delay,
            dispose: DisposalMethod::Keep,
        }
    }
}

/// Encode a small GIF of solid-colour patches on a `width x height` screen.
#[cfg(test)]
pub(crate) fn synth_gif(width: u16, height: u16, frames: &[SynthFrame]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, width, height, &[]).unwrap();
        for f in frames {
            let mut rgba: Vec<u8> = f
                .rgba
                .iter()
                .copied()
                .cycle()
                .take(usize::from(f.width) * usize::from(f.height) * 4)
                .collect();
            let mut frame = gif::Frame::from_rgba_speed(f.width, f.height, &mut rgba, 10);
            frame.left = f.left;
            frame.top = f.top;
            frame.delay = f.delay;
            frame.dispose = f.dispose;
            encoder.write_frame(&frame).unwrap();
        }
    }
    out
}

/// `n` opaque frames of `w x h`, 100 ms apart.
#[cfg(test)]
pub(crate) fn plain_gif(w: u16, h: u16, n: usize) -> Vec<u8> {
    let frames: Vec<_> = (0..n)
        .map(|i| SynthFrame::solid(w, h, [200, (i * 40) as u8, 40, 255], 10))
        .collect();
    synth_gif(w, h, &frames)
}
