//! Raw camera pixel formats to packed RGBA, written straight into a [`Frame`].

use std::convert::TryFrom;

use anyhow::{Result, anyhow, ensure};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Nv12,
    Yuyv,
    Mjpeg,
    Rgb,
    Bgr,
    Gray,
}

/// Decodes `data` into `frame`, reusing its buffer. Updates the frame's
/// dimensions and timestamp on success.
pub fn convert_into(
    frame: &mut Frame,
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<()> {
    let pixels = width as usize * height as usize;
    let (mut width, mut height) = (width, height);

    match format {
        PixelFormat::Nv12 => nv12_into(data, width, height, reset(&mut frame.rgba, pixels))?,
        PixelFormat::Yuyv => yuyv_into(data, width, height, reset(&mut frame.rgba, pixels))?,
        PixelFormat::Rgb => rgb_like_into(data, pixels, false, reset(&mut frame.rgba, pixels))?,
        PixelFormat::Bgr => rgb_like_into(data, pixels, true, reset(&mut frame.rgba, pixels))?,
        PixelFormat::Gray => gray_into(data, pixels, reset(&mut frame.rgba, pixels))?,
        PixelFormat::Mjpeg => (width, height) = mjpeg_into(data, &mut frame.rgba)?,
    }

    frame.width = width;
    frame.height = height;
    frame.timestamp = std::time::Instant::now();
    Ok(())
}

fn reset(rgba: &mut Vec<u8>, pixels: usize) -> &mut [u8] {
    rgba.clear();
    rgba.resize(pixels * 4, 0);
    rgba
}

fn nv12_into(data: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;
    ensure!(
        data.len() >= y_plane_len + uv_plane_len,
        "NV12 buffer too small: got {}, expected {}",
        data.len(),
        y_plane_len + uv_plane_len
    );

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };
    yuv_nv12_to_rgba(
        &image,
        rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 to RGBA failed: {err:?}"))
}

fn yuyv_into(data: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()> {
    let expected_len = width as usize * height as usize * 2;
    ensure!(
        data.len() >= expected_len,
        "YUYV buffer too small: got {}, expected {}",
        data.len(),
        expected_len
    );

    let packed = YuvPackedImage {
        yuy: &data[..expected_len],
        yuy_stride: width * 2,
        width,
        height,
    };
    yuyv422_to_rgba(
        &packed,
        rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422 to RGBA failed: {err:?}"))
}

/// Returns the decoded dimensions; MJPEG carries its own.
fn mjpeg_into(data: &[u8], rgba: &mut Vec<u8>) -> Result<(u32, u32)> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let decoded = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decoder reported no image info"))?;

    let (width, height) = u32::try_from(info.width)
        .and_then(|w| u32::try_from(info.height).map(|h| (w, h)))
        .map_err(|_| anyhow!("MJPEG dimensions do not fit u32"))?;
    let expected_len = width as usize * height as usize * 4;
    ensure!(
        decoded.len() >= expected_len,
        "MJPEG decode produced too few bytes: got {}, expected {}",
        decoded.len(),
        expected_len
    );

    *rgba = decoded;
    rgba.truncate(expected_len);
    Ok((width, height))
}

fn rgb_like_into(data: &[u8], pixels: usize, swap_rb: bool, rgba: &mut [u8]) -> Result<()> {
    ensure!(
        data.len() >= pixels * 3,
        "RGB buffer too small: got {}, expected {}",
        data.len(),
        pixels * 3
    );

    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            let (r, b) = if swap_rb {
                (src[2], src[0])
            } else {
                (src[0], src[2])
            };
            dst.copy_from_slice(&[r, src[1], b, 255]);
        });
    Ok(())
}

fn gray_into(data: &[u8], pixels: usize, rgba: &mut [u8]) -> Result<()> {
    ensure!(
        data.len() >= pixels,
        "GRAY buffer too small: got {}, expected {}",
        data.len(),
        pixels
    );

    rgba.par_chunks_mut(4)
        .zip(data[..pixels].par_iter().copied())
        .for_each(|(dst, value)| dst.copy_from_slice(&[value, value, value, 255]));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_swaps_channels() {
        let mut frame = Frame::empty();
        convert_into(&mut frame, &[1, 2, 3, 4, 5, 6], 2, 1, PixelFormat::Bgr).unwrap();
        assert_eq!(frame.rgba, vec![3, 2, 1, 255, 6, 5, 4, 255]);
        assert_eq!((frame.width, frame.height), (2, 1));
    }

    #[test]
    fn gray_expands_to_opaque_rgba() {
        let mut frame = Frame::empty();
        convert_into(&mut frame, &[9, 200], 1, 2, PixelFormat::Gray).unwrap();
        assert_eq!(frame.rgba, vec![9, 9, 9, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let mut frame = Frame::empty();
        assert!(convert_into(&mut frame, &[0; 5], 2, 2, PixelFormat::Rgb).is_err());
        assert!(convert_into(&mut frame, &[0; 7], 2, 2, PixelFormat::Yuyv).is_err());
        assert!(convert_into(&mut frame, &[0; 5], 2, 2, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn yuyv_gray_level_round_trips() {
        // Neutral chroma keeps the luma value on every channel.
        let yuyv = [128u8, 128, 128, 128, 128, 128, 128, 128];
        let mut frame = Frame::empty();
        convert_into(&mut frame, &yuyv, 2, 2, PixelFormat::Yuyv).unwrap();
        assert_eq!(frame.rgba.len(), 16);
        for px in frame.rgba.chunks_exact(4) {
            assert!((i16::from(px[0]) - 128).abs() <= 2);
            assert_eq!(px[3], 255);
        }
    }
}
