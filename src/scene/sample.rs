use crate::foundation::error::DataraceResult;
use crate::scene::color::Color;
use crate::scene::dataset::Dataset;
use crate::scene::model::{Entity, Snapshot, Timeline};

const ENTITIES: [(&str, &str, Color, &str); 6] = [
    (
        "fb",
        "Facebook",
        Color::rgb(0x18, 0x77, 0xf2),
        "https://upload.wikimedia.org/wikipedia/commons/5/51/Facebook_f_logo_%282019%29.svg",
    ),
    (
        "yt",
        "YouTube",
        Color::rgb(0xff, 0x00, 0x00),
        "https://upload.wikimedia.org/wikipedia/commons/0/09/YouTube_full-color_icon_%282017%29.svg",
    ),
    (
        "wa",
        "WhatsApp",
        Color::rgb(0x25, 0xd3, 0x66),
        "https://upload.wikimedia.org/wikipedia/commons/6/6b/WhatsApp.svg",
    ),
    (
        "ig",
        "Instagram",
        Color::rgb(0xe4, 0x40, 0x5f),
        "https://upload.wikimedia.org/wikipedia/commons/e/e7/Instagram_logo_2016.svg",
    ),
    (
        "tt",
        "TikTok",
        Color::rgb(0x00, 0x00, 0x00),
        "https://upload.wikimedia.org/wikipedia/en/a/a9/TikTok_logo.svg",
    ),
    (
        "wx",
        "WeChat",
        Color::rgb(0x7b, 0xb3, 0x2e),
        "https://upload.wikimedia.org/wikipedia/en/c/c5/WeChat_logo.png",
    ),
];

// Columns follow ENTITIES order.
const YEARS: [(&str, [f64; 6]); 11] = [
    ("2012", [900.0, 700.0, 150.0, 50.0, 0.0, 100.0]),
    ("2013", [1100.0, 900.0, 300.0, 120.0, 0.0, 250.0]),
    ("2014", [1300.0, 1100.0, 500.0, 250.0, 0.0, 400.0]),
    ("2015", [1500.0, 1300.0, 800.0, 400.0, 0.0, 600.0]),
    ("2016", [1700.0, 1400.0, 1000.0, 550.0, 50.0, 800.0]),
    ("2017", [1900.0, 1500.0, 1200.0, 750.0, 150.0, 900.0]),
    ("2018", [2100.0, 1700.0, 1400.0, 900.0, 400.0, 1000.0]),
    ("2019", [2300.0, 1900.0, 1600.0, 1000.0, 600.0, 1100.0]),
    ("2020", [2500.0, 2100.0, 1800.0, 1200.0, 800.0, 1150.0]),
    ("2021", [2700.0, 2300.0, 2000.0, 1300.0, 1000.0, 1200.0]),
    ("2022", [2910.0, 2562.0, 2000.0, 1478.0, 1000.0, 1263.0]),
];

/// Built-in demo dataset: social media platform users, 2012-2022.
pub fn sample_dataset() -> DataraceResult<Dataset> {
    let entities = ENTITIES
        .iter()
        .map(|(id, label, color, icon)| Entity {
            id: (*id).to_owned(),
            label: (*label).to_owned(),
            color: *color,
            icon: Some((*icon).to_owned()),
        })
        .collect();

    let snapshots = YEARS
        .iter()
        .map(|(year, values)| {
            Snapshot::new(
                *year,
                ENTITIES
                    .iter()
                    .zip(values.iter())
                    .map(|((id, ..), v)| (*id, *v)),
            )
        })
        .collect::<Vec<_>>();

    Dataset::new(
        "Most Popular Social Media Platforms (2012-2022)",
        "Active Users (in Millions)",
        "DataReportal & Statista",
        entities,
        Timeline::new(snapshots)?,
    )
}
