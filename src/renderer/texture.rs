use std::fmt;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec4};
use image::GenericImageView;

use crate::renderer::backend::{Gpu, TextureHandle};

/// What a texture is used for in a material. Decides the name of the sampler
/// uniform the texture is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    /// The prefix of the `material.<prefix><n>` sampler uniforms.
    pub fn sampler_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "diffuse",
            TextureKind::Specular => "specular",
            TextureKind::Normal => "normal",
            TextureKind::Height => "height",
        }
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sampler_prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Red,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Red => 1,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A decoded 8-bit image, ready to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    pub fn solid(color: [u8; 4]) -> TextureImage {
        TextureImage {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba,
            pixels: color.to_vec(),
        }
    }

    /// Decodes the image file at `path`. Grayscale images are kept as a single
    /// red channel, images with alpha as RGBA, and everything else as RGB.
    pub fn open(path: &Path) -> Result<TextureImage, image::ImageError> {
        let image = image::open(path)?;
        let (width, height) = image.dimensions();
        let channels = image.color().channel_count();
        let (format, pixels) = match channels {
            1 => (PixelFormat::Red, image.into_luma8().into_raw()),
            2 | 4 => (PixelFormat::Rgba, image.into_rgba8().into_raw()),
            _ => (PixelFormat::Rgb, image.into_rgb8().into_raw()),
        };
        Ok(TextureImage {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Nearest-neighbour lookup with repeat wrapping, returning normalized
    /// RGBA. Missing channels read as 0, except alpha which reads as 1.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::ZERO;
        }
        let wrap = |t: f32, size: u32| {
            let t = t - t.floor();
            ((t * size as f32) as u32).min(size - 1) as usize
        };
        let x = wrap(uv.x, self.width);
        let y = wrap(uv.y, self.height);
        let channels = self.format.channels();
        let start = (y * self.width as usize + x) * channels;
        let texel = &self.pixels[start..start + channels];
        let channel = |i: usize, default: f32| {
            texel
                .get(i)
                .map(|&value| value as f32 / 255.0)
                .unwrap_or(default)
        };
        Vec4::new(channel(0, 0.0), channel(1, 0.0), channel(2, 0.0), channel(3, 1.0))
    }
}

/// An uploaded 2D texture. Deleted from the GPU when dropped, so share it
/// with `Rc` between the meshes that use it.
pub struct Texture {
    gpu: Gpu,
    handle: TextureHandle,
    path: PathBuf,
}

impl Texture {
    pub fn new(gpu: &Gpu, image: &TextureImage, path: impl Into<PathBuf>) -> Texture {
        let handle = gpu.create_texture(image);
        Texture {
            gpu: gpu.clone(),
            handle,
            path: path.into(),
        }
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// The file this texture was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.gpu.delete_texture(self.handle);
    }
}
