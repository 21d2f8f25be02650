use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::ImageReader;

use crate::theme::IconTheme;
use crate::worker::Resolve;

/// Decoded RGBA8 bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct Icon {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icon")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Icon {
    pub fn load(path: &Path) -> Option<Icon> {
        Self::decode(path, None)
    }

    /// Like [`load`](Self::load), but images larger than `max` on either edge
    /// are shrunk to fit inside `max`x`max`, keeping the aspect ratio.
    pub fn load_scaled(path: &Path, max: u32) -> Option<Icon> {
        Self::decode(path, Some(max.max(1)))
    }

    fn decode(path: &Path, max: Option<u32>) -> Option<Icon> {
        let decoded = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(image::ImageError::IoError)
            .and_then(|reader| reader.decode());

        match decoded {
            Ok(mut image) => {
                if let Some(max) = max {
                    if image.width() > max || image.height() > max {
                        image = image.thumbnail(max, max);
                    }
                }
                let rgba = image.to_rgba8();
                let (width, height) = rgba.dimensions();
                Some(Icon {
                    rgba: rgba.into_raw(),
                    width,
                    height,
                })
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "icon decode failed");
                None
            }
        }
    }

    /// Converts packed `0xAARRGGBB` pixels, as published by window managers,
    /// into RGBA bytes. Returns `None` when the pixel count does not match.
    pub fn from_argb_pixels(width: u32, height: u32, pixels: &[u32]) -> Option<Icon> {
        let expected = (width as usize).checked_mul(height as usize)?;
        if expected == 0 || pixels.len() != expected {
            return None;
        }

        let mut rgba = Vec::with_capacity(expected * 4);
        for pixel in pixels {
            let [a, r, g, b] = pixel.to_be_bytes();
            rgba.extend_from_slice(&[r, g, b, a]);
        }

        Some(Icon {
            rgba,
            width,
            height,
        })
    }

    /// Largest size that fits inside `max` while keeping the aspect ratio.
    pub fn size_to_fit(&self, max: [f32; 2]) -> [f32; 2] {
        if self.width == 0 || self.height == 0 {
            return [0.0, 0.0];
        }

        let scale_x = max[0] / self.width as f32;
        let scale_y = max[1] / self.height as f32;
        if scale_x < scale_y {
            [max[0], scale_x * self.height as f32]
        } else {
            [scale_y * self.width as f32, max[1]]
        }
    }
}

/// Resolves icon names (theme names or absolute image paths) to decoded
/// bitmaps no larger than the theme's icon size.
pub struct IconResolver {
    theme: IconTheme,
    max_size: u32,
}

impl IconResolver {
    pub fn new(theme: IconTheme) -> Self {
        let max_size = theme.size();
        Self { theme, max_size }
    }
}

impl Resolve for IconResolver {
    type Key = Arc<str>;
    type Output = Icon;

    fn resolve(&self, name: &Arc<str>) -> Option<Icon> {
        let path = Path::new(name.as_ref());
        if path.is_absolute() {
            return Icon::load_scaled(path, self.max_size);
        }

        let found = self.theme.lookup(name)?;
        Icon::load_scaled(&found, self.max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32) {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        image.save(path).unwrap();
    }

    #[test]
    fn loads_png_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("folder.png");
        write_png(&png, 4, 2);
        let junk = dir.path().join("junk.png");
        std::fs::write(&junk, b"definitely not a png").unwrap();

        let icon = Icon::load(&png).unwrap();
        assert_eq!((icon.width, icon.height), (4, 2));
        assert_eq!(&icon.rgba[..4], &[10, 20, 30, 255]);
        assert!(Icon::load(&junk).is_none());
        assert!(Icon::load(&dir.path().join("absent.png")).is_none());
    }

    #[test]
    fn argb_pixels_become_rgba() {
        let icon = Icon::from_argb_pixels(2, 1, &[0x80112233, 0xff0000ff]).unwrap();
        assert_eq!(icon.rgba, vec![0x11, 0x22, 0x33, 0x80, 0x00, 0x00, 0xff, 0xff]);
        assert!(Icon::from_argb_pixels(2, 2, &[0; 3]).is_none());
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        let icon = Icon {
            rgba: Vec::new(),
            width: 200,
            height: 100,
        };
        assert_eq!(icon.size_to_fit([100.0, 100.0]), [100.0, 50.0]);
    }

    #[test]
    fn absolute_names_bypass_the_theme() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("thumb.png");
        write_png(&png, 3, 3);

        let resolver = IconResolver::new(IconTheme::with_roots(Vec::new(), Vec::new(), 64));
        let name: Arc<str> = Arc::from(png.to_string_lossy().as_ref());
        assert!(resolver.resolve(&name).is_some());
        assert!(resolver.resolve(&Arc::from("folder")).is_none());
    }

    #[test]
    fn large_images_are_shrunk_to_the_icon_size() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("photo.png");
        write_png(&photo, 1024, 768);
        let small = dir.path().join("small.png");
        write_png(&small, 16, 8);

        let resolver = IconResolver::new(IconTheme::with_roots(Vec::new(), Vec::new(), 64));
        let name: Arc<str> = Arc::from(photo.to_string_lossy().as_ref());
        let icon = resolver.resolve(&name).unwrap();
        assert_eq!((icon.width, icon.height), (64, 48));
        assert_eq!(icon.rgba.len(), 64 * 48 * 4);

        let name: Arc<str> = Arc::from(small.to_string_lossy().as_ref());
        let icon = resolver.resolve(&name).unwrap();
        assert_eq!((icon.width, icon.height), (16, 8));
    }
}
