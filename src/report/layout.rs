//! Page geometry and text content for report pages.
//!
//! Coordinates here use a top-left origin in PDF points; the PDF writer
//! flips them into page space.

use crate::models::{attachment::Attachment, fruit::FruitRecord};
use chrono::{DateTime, Local, Utc};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// US Letter at 72 dpi.
pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;

pub const MARGIN: f64 = 20.0;
pub const TEXT_TOP: f64 = 20.0;
pub const FONT_SIZE: f64 = 16.0;
pub const LINE_HEIGHT: f64 = 20.0;

/// The image never starts above this offset, however short the text block.
pub const IMAGE_TOP_MIN: f64 = 150.0;
const IMAGE_GAP: f64 = 10.0;
const BOTTOM_MARGIN: f64 = 50.0;

/// A piece of fruit metadata that can appear in a page's text block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportField {
    Name,
    Family,
    Genus,
    Order,
    Calories,
    Carbohydrates,
    Protein,
    Fat,
    Sugar,
    PhotoDate,
}

impl ReportField {
    pub const DEFAULT: [ReportField; 6] = [
        ReportField::Name,
        ReportField::Family,
        ReportField::Genus,
        ReportField::Order,
        ReportField::Calories,
        ReportField::PhotoDate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Family => "Family",
            Self::Genus => "Genus",
            Self::Order => "Order",
            Self::Calories => "Calories",
            Self::Carbohydrates => "Carbohydrates",
            Self::Protein => "Protein",
            Self::Fat => "Fat",
            Self::Sugar => "Sugar",
            Self::PhotoDate => "Photo Date",
        }
    }

    /// The `Label: value` line for this field.
    pub fn render(self, fruit: &FruitRecord, attachment: &Attachment) -> String {
        let n = &fruit.nutritions;
        let value = match self {
            Self::Name => fruit.name.clone(),
            Self::Family => fruit.family.clone(),
            Self::Genus => fruit.genus.clone(),
            Self::Order => fruit.order.clone(),
            Self::Calories => n.calories.to_string(),
            Self::Carbohydrates => n.carbohydrates.to_string(),
            Self::Protein => n.protein.to_string(),
            Self::Fat => n.fat.to_string(),
            Self::Sugar => n.sugar.to_string(),
            Self::PhotoDate => format_photo_date(attachment.timestamp),
        };
        format!("{}: {}", self.label(), value)
    }

    fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Family => "family",
            Self::Genus => "genus",
            Self::Order => "order",
            Self::Calories => "calories",
            Self::Carbohydrates => "carbohydrates",
            Self::Protein => "protein",
            Self::Fat => "fat",
            Self::Sugar => "sugar",
            Self::PhotoDate => "photo-date",
        }
    }
}

impl fmt::Display for ReportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown report field `{0}`")]
pub struct UnknownReportField(pub String);

impl FromStr for ReportField {
    type Err = UnknownReportField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "name" => Self::Name,
            "family" => Self::Family,
            "genus" => Self::Genus,
            "order" => Self::Order,
            "calories" => Self::Calories,
            "carbohydrates" | "carbs" => Self::Carbohydrates,
            "protein" => Self::Protein,
            "fat" => Self::Fat,
            "sugar" => Self::Sugar,
            "photo-date" | "date" => Self::PhotoDate,
            _ => return Err(UnknownReportField(s.trim().to_string())),
        };
        Ok(field)
    }
}

/// Parse a comma-separated field list such as `name,family,calories`.
pub fn parse_report_fields(list: &str) -> Result<Vec<ReportField>, UnknownReportField> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Medium date plus short time in the local zone, e.g. `Oct 18, 2026 at 3:04 PM`.
pub fn format_photo_date(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%b %-d, %Y at %-I:%M %p")
        .to_string()
}

/// Axis-aligned rectangle, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale `width`×`height` into `max_width`×`max_height`, preserving aspect.
///
/// Width-bound first; if that overflows `max_height`, height-bound instead.
pub fn fit_image(width: f64, height: f64, max_width: f64, max_height: f64) -> (f64, f64) {
    if width <= 0.0 || height <= 0.0 || max_width <= 0.0 || max_height <= 0.0 {
        return (0.0, 0.0);
    }

    let aspect_ratio = width / height;
    let scaled_width = max_width;
    let scaled_height = scaled_width / aspect_ratio;
    if scaled_height > max_height {
        (max_height * aspect_ratio, max_height)
    } else {
        (scaled_width, scaled_height)
    }
}

/// Where a page's text lines and image go.
#[derive(Clone, Debug, PartialEq)]
pub struct PageLayout {
    /// Top edge of each text line.
    pub line_tops: Vec<f64>,
    pub image: Rect,
}

/// Lay out `line_count` text lines above an image of the given pixel size.
///
/// The image sits at least [`IMAGE_TOP_MIN`] from the top (further down if
/// the text block is taller), spans at most the page width minus margins,
/// and is centered horizontally.
pub fn layout_page(line_count: usize, image_width: f64, image_height: f64) -> PageLayout {
    let line_tops: Vec<f64> = (0..line_count)
        .map(|i| TEXT_TOP + LINE_HEIGHT * i as f64)
        .collect();
    let text_bottom = TEXT_TOP + LINE_HEIGHT * line_count as f64;

    let image_top = IMAGE_TOP_MIN.max(text_bottom + IMAGE_GAP);
    let max_width = PAGE_WIDTH - 2.0 * MARGIN;
    let max_height = PAGE_HEIGHT - image_top - BOTTOM_MARGIN;
    let (width, height) = fit_image(image_width, image_height, max_width, max_height);

    PageLayout {
        line_tops,
        image: Rect {
            x: (PAGE_WIDTH - width) / 2.0,
            y: image_top,
            width,
            height,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{attachment_at, fruit};
    use chrono::TimeZone;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn wide_image_is_width_bound() {
        let (w, h) = fit_image(200.0, 100.0, 572.0, 400.0);
        assert!(close(w, 572.0) && close(h, 286.0), "{w}x{h}");
    }

    #[test]
    fn tall_image_is_height_bound() {
        let (w, h) = fit_image(100.0, 300.0, 572.0, 400.0);
        assert!(close(w, 133.33) && close(h, 400.0), "{w}x{h}");
    }

    #[test]
    fn degenerate_sizes_collapse_to_zero() {
        assert_eq!(fit_image(0.0, 10.0, 572.0, 400.0), (0.0, 0.0));
        assert_eq!(fit_image(10.0, 10.0, 572.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn default_layout_matches_letter_geometry() {
        let layout = layout_page(ReportField::DEFAULT.len(), 200.0, 100.0);

        assert_eq!(layout.line_tops.len(), 6);
        assert_eq!(layout.line_tops[0], TEXT_TOP);
        assert_eq!(layout.image.y, IMAGE_TOP_MIN);
        assert!(close(layout.image.width, 572.0));
        assert!(close(layout.image.height, 286.0));
        assert!(close(layout.image.x, 20.0));
    }

    #[test]
    fn tall_images_are_centered_and_fit_above_bottom_margin() {
        let layout = layout_page(6, 100.0, 1000.0);

        assert!(close(layout.image.height, PAGE_HEIGHT - IMAGE_TOP_MIN - 50.0));
        assert!(close(layout.image.x * 2.0 + layout.image.width, PAGE_WIDTH));
    }

    #[test]
    fn long_text_blocks_push_the_image_down() {
        let layout = layout_page(10, 200.0, 100.0);
        assert!(close(layout.image.y, TEXT_TOP + 10.0 * LINE_HEIGHT + 10.0));
    }

    #[test]
    fn fields_parse_from_config_lists() {
        assert_eq!(
            parse_report_fields("name, Family,photo_date,carbs").unwrap(),
            vec![
                ReportField::Name,
                ReportField::Family,
                ReportField::PhotoDate,
                ReportField::Carbohydrates,
            ]
        );
        assert_eq!(
            parse_report_fields("name,colour"),
            Err(UnknownReportField("colour".into()))
        );
        for field in ReportField::DEFAULT {
            assert_eq!(field.to_string().parse::<ReportField>().unwrap(), field);
        }
    }

    #[test]
    fn fields_render_label_and_value() {
        let apple = fruit("Apple", "Rosaceae", 52.0);
        let taken = Utc.with_ymd_and_hms(2026, 10, 18, 15, 4, 0).unwrap();
        let attachment = attachment_at("Apple", taken);

        assert_eq!(ReportField::Name.render(&apple, &attachment), "Name: Apple");
        assert_eq!(ReportField::Family.render(&apple, &attachment), "Family: Rosaceae");
        assert_eq!(ReportField::Calories.render(&apple, &attachment), "Calories: 52");
        assert_eq!(
            ReportField::PhotoDate.render(&apple, &attachment),
            format!("Photo Date: {}", format_photo_date(taken))
        );
    }

    #[test]
    fn photo_date_uses_medium_date_and_short_time() {
        let taken = Local.with_ymd_and_hms(2026, 10, 18, 15, 4, 0).unwrap();
        assert_eq!(
            format_photo_date(taken.with_timezone(&Utc)),
            "Oct 18, 2026 at 3:04 PM"
        );
    }
}
