use img_hash::{HashAlg, HasherConfig};
use sha2::{Digest, Sha256};
use std::io::Cursor;

use crate::record::Metadata;

/// 原始字节的 SHA256，小写 Hex
///
/// 哪怕只改一个字节这个值都会雪崩式变化，所以只能做"完全相同"的去重键。
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// 提取图片技术元数据
///
/// 解码失败不会中止扫描：返回只含 `Error` 一项的元数据。
pub fn extract_metadata(bytes: &[u8]) -> Metadata {
    match try_extract(bytes) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!("⚠️ 元数据提取失败: {}", e);
            let mut metadata = Metadata::new();
            metadata.insert(
                "Error".to_string(),
                format!("Could not extract metadata: {}", e).into(),
            );
            metadata
        }
    }
}

fn try_extract(bytes: &[u8]) -> anyhow::Result<Metadata> {
    use img_hash::image::{self, GenericImageView};

    let format = image::guess_format(bytes)?;
    // 真正解码像素，格式头对但数据损坏也会在这里报错
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = img.dimensions();

    // 梯度算法比均值算法对明暗变化更鲁棒；8x8 = 64 位指纹
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(8, 8)
        .to_hasher();
    let phash = hasher.hash_image(&img);

    // 1. 先放 EXIF 标签，基础字段后写，同名时以基础字段为准
    let mut metadata = exif_tags(bytes);

    // 2. 基础技术信息
    metadata.insert("Image Size".into(), format!("{} x {}", width, height).into());
    metadata.insert("Image Mode".into(), format!("{:?}", img.color()).into());
    metadata.insert("Image Format".into(), format!("{:?}", format).to_uppercase().into());
    metadata.insert("File Size".into(), bytes.len().into());
    metadata.insert("Perceptual Hash".into(), phash.to_base64().into());
    Ok(metadata)
}

/// 读取主 IFD 的全部 EXIF 标签，键为标签名（如 `Software`、`Model`）
///
/// 没有 EXIF 段（大多数 PNG、截图）是常态，不算错误，返回空表。
fn exif_tags(bytes: &[u8]) -> Metadata {
    let mut metadata = Metadata::new();
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return metadata,
        Err(e) => {
            tracing::debug!("EXIF 解析失败，跳过: {}", e);
            return metadata;
        }
    };

    // 缩略图 IFD 会重复一部分标签，只取主图
    for field in exif.fields().filter(|f| f.ifd_num == exif::In::PRIMARY) {
        let value = match &field.value {
            // ASCII 直接取文本，避免 display_value 带引号
            exif::Value::Ascii(parts) => parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(", "),
            _ => field.display_value().with_unit(&exif).to_string(),
        };
        metadata.insert(field.tag.to_string(), value.into());
    }
    metadata
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use img_hash::image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

    /// 生成一张小 PNG，测试和基准共用
    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, 128])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn file_hash_is_sha256_hex() {
        // echo -n "abc" | sha256sum
        assert_eq!(
            file_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn extracts_png_metadata() {
        let png = sample_png(16, 8);
        let metadata = extract_metadata(&png);

        assert!(!metadata.contains_key("Error"));
        assert_eq!(metadata["Image Size"], "16 x 8");
        assert_eq!(metadata["Image Format"], "PNG");
        assert_eq!(metadata["File Size"], png.len());
        assert!(metadata["Perceptual Hash"].as_str().is_some());
    }

    /// 在 JPEG 的 SOI 之后插入一个只含 Software 标签的 APP1 Exif 段
    fn jpeg_with_software_tag(software: &str) -> Vec<u8> {
        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 64]));
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut jpeg, ImageOutputFormat::Jpeg(90))
            .unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let mut text = software.as_bytes().to_vec();
        text.push(0);

        // TIFF 头（小端）+ IFD0：1 个条目，之后紧跟字符串数据
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x0131u16.to_le_bytes()); // Software
        tiff.extend_from_slice(&2u16.to_le_bytes()); // ASCII
        tiff.extend_from_slice(&(text.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&26u32.to_le_bytes()); // 8 + 2 + 12 + 4
        tiff.extend_from_slice(&0u32.to_le_bytes()); // 没有下一个 IFD
        tiff.extend_from_slice(&text);

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn exif_tags_are_merged_into_metadata() {
        let jpeg = jpeg_with_software_tag("GIMP");
        let metadata = extract_metadata(&jpeg);

        assert!(!metadata.contains_key("Error"));
        assert_eq!(metadata["Software"], "GIMP");
        assert_eq!(metadata["Image Size"], "16 x 16");
        assert_eq!(metadata["Image Format"], "JPEG");
    }

    #[test]
    fn png_without_exif_has_only_basic_keys() {
        let metadata = extract_metadata(&sample_png(8, 8));
        let keys: Vec<_> = metadata.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["File Size", "Image Format", "Image Mode", "Image Size", "Perceptual Hash"]
        );
    }

    #[test]
    fn corrupt_bytes_recover_with_error_entry() {
        let metadata = extract_metadata(b"definitely not an image");
        assert_eq!(metadata.len(), 1);
        let msg = metadata["Error"].as_str().unwrap();
        assert!(msg.starts_with("Could not extract metadata"));
    }

    #[test]
    fn truncated_png_recovers_too() {
        let png = sample_png(16, 16);
        let metadata = extract_metadata(&png[..png.len() / 2]);
        assert!(metadata.contains_key("Error"));
    }
}
