pub mod image_helper {
    use crate::core_modules::classifier::Label;
    use crate::core_modules::region::Region;
    use crate::error::{Result, VisionError};
    use image::codecs::png::PngEncoder;
    use image::{ImageEncoder, Rgb, RgbImage};
    use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
    use imageproc::rect::Rect;
    use std::path::{Path, PathBuf};

    /// File extensions treated as still images, compared case-insensitively.
    pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

    /// Height of the colored tag drawn above an annotation box.
    pub const TAG_HEIGHT: u32 = 12;

    pub fn save_png(path: &Path, image: &RgbImage) -> Result<()> {
        let write = || -> std::result::Result<(), image::ImageError> {
            let output = std::io::BufWriter::new(std::fs::File::create(path)?);
            let encoder = PngEncoder::new(output);
            encoder.write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgb8)?;
            Ok(())
        };
        write().map_err(|source| VisionError::ImageSave {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The still images directly inside `dir`, sorted by file name.
    pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)));
            if is_image && path.is_file() {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }

    /// Overlay color for a label, in RGB.
    pub fn label_color(label: Label) -> Rgb<u8> {
        match label {
            Label::GoodEgg => Rgb([0, 200, 0]),
            Label::BadEgg => Rgb([220, 0, 0]),
            Label::Uncertain => Rgb([230, 200, 0]),
            Label::NoEgg => Rgb([128, 128, 128]),
        }
    }

    /// Draws the region outline (2 px) in the label's color with a filled tag
    /// strip above it, or inside the top edge when there is no room above.
    /// Text-capable sinks write the label name onto the strip.
    pub fn annotate(image: &mut RgbImage, region: Region, label: Label) {
        if region.width == 0 || region.height == 0 {
            return;
        }
        let color = label_color(label);
        let outer = Rect::at(region.x as i32, region.y as i32).of_size(region.width, region.height);
        draw_hollow_rect_mut(image, outer, color);
        if region.width > 2 && region.height > 2 {
            let inner = Rect::at(region.x as i32 + 1, region.y as i32 + 1).of_size(region.width - 2, region.height - 2);
            draw_hollow_rect_mut(image, inner, color);
        }

        let tag_y = if region.y >= TAG_HEIGHT { region.y - TAG_HEIGHT } else { region.y };
        draw_filled_rect_mut(
            image,
            Rect::at(region.x as i32, tag_y as i32).of_size(region.width, TAG_HEIGHT.min(region.height)),
            color,
        );
    }
}
