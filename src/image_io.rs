//! Image file reading, EXIF-aware decoding and PNG output.

use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use log::{debug, warn, error};

use crate::error::{LeafError, LeafResult};

/// Raw bytes of a selected image plus what we know about their format
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub format: Option<ImageFormat>,
}

impl ImageFile {
    /// File name sent with the multipart upload
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }

    pub fn mime_type(&self) -> &'static str {
        self.format
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }
}

pub async fn read_image_file(path: &Path) -> LeafResult<ImageFile> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LeafError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = image::guess_format(&bytes).ok();
    debug!("Read {} bytes from {} ({:?})", bytes.len(), path.display(), format);

    Ok(ImageFile {
        path: path.to_path_buf(),
        bytes,
        format,
    })
}

/// Decode image bytes with EXIF orientation applied.
///
/// Falls back to a plain decode when the format has no decoder interface.
pub fn decode_with_exif_orientation(bytes: &[u8]) -> Result<DynamicImage, String> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("failed to guess image format: {}", e))?;

    match reader.into_decoder() {
        Ok(mut decoder) => {
            let orientation = decoder
                .orientation()
                .unwrap_or(image::metadata::Orientation::NoTransforms);

            let mut img = DynamicImage::from_decoder(decoder).map_err(|e| e.to_string())?;

            if orientation != image::metadata::Orientation::NoTransforms {
                debug!("Applying EXIF orientation {:?}", orientation);
                img.apply_orientation(orientation);
            }

            Ok(img)
        }
        Err(e) => {
            warn!("Decoder creation failed, falling back to simple decode: {}", e);
            ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .map_err(|e| e.to_string())?
                .decode()
                .map_err(|e| e.to_string())
        }
    }
}

/// Decode a selected file into an RGBA buffer
pub fn decode_rgba(file: &ImageFile) -> LeafResult<RgbaImage> {
    decode_with_exif_orientation(&file.bytes)
        .map(|img| img.into_rgba8())
        .map_err(|reason| {
            error!("Failed to decode {}: {}", file.path.display(), reason);
            LeafError::Decode {
                path: file.path.clone(),
                reason,
            }
        })
}

pub fn encode_png(img: &RgbaImage) -> LeafResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

pub async fn save_png(img: &RgbaImage, path: &Path) -> LeafResult<()> {
    let bytes = encode_png(img)?;
    tokio::fs::write(path, bytes).await.map_err(|source| LeafError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `<dir>/<stem><suffix>.png` next to the input image
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}{}.png", stem, suffix))
}
