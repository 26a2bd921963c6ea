use anyhow::Result;

use crate::render::backend::RgbaImage;

/// Encodes a frame as an 8-bit RGBA PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width, image.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;

        let row_len = (image.width * 4) as usize;
        if image.stride as usize == row_len {
            writer.write_image_data(&image.pixels[..row_len * image.height as usize])?;
        } else {
            let mut packed = Vec::with_capacity(row_len * image.height as usize);
            for y in 0..image.height {
                packed.extend_from_slice(image.row(y));
            }
            writer.write_image_data(&packed)?;
        }
        writer.finish()?;
    }

    Ok(out)
}
