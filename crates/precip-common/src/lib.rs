//! Common types shared across the precipitation aggregation workspace.

pub mod aoi;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod site;
pub mod time;

pub use aoi::{AreaOfInterest, PolygonPart};
pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{CommonError, CommonResult};
pub use grid::{Grid, GridGeometry, GridStack};
pub use site::{assign_ids, Site, SitePoint};
pub use time::{days_in_month, CalendarKey, TimeCodec, TimeParseError, TokenPattern, MONTH_LABELS};
