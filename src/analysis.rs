//! Client-side dataframe analyses, computed from one projected pass over
//! the collection. These complement the server-side report sections with
//! aggregates the pipeline language handles poorly (medians, derived
//! rates).

use std::fmt;
use std::result::Result;

use polars::prelude::*;

use crate::buffer::FieldKind;
use crate::error::Error;
use crate::store::ListingStore;

pub struct Analysis {
    pub title: &'static str,
    pub frame: DataFrame,
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " ---- {} ---- ", self.title)?;
        write!(f, "{}", self.frame)
    }
}

pub fn run_all(store: &ListingStore) -> Result<Vec<Analysis>, Error> {
    let listings = store.load_frame(&[
        ("room_type", FieldKind::Utf8),
        ("number_of_reviews", FieldKind::Int64),
        ("availability_365", FieldKind::Float64),
        ("neighbourhood_cleansed", FieldKind::Utf8),
    ])?;

    Ok(vec![
        Analysis {
            title: "Average annual booking rate per room type",
            frame: booking_rate_by_room_type(&listings)?,
        },
        Analysis {
            title: "Median number of reviews",
            frame: median_reviews(&listings)?,
        },
        Analysis {
            title: "Median number of reviews per room type",
            frame: median_reviews_by_room_type(&listings)?,
        },
        Analysis {
            title: "Listings per neighbourhood",
            frame: listings_per_neighbourhood(&listings)?,
        },
        Analysis {
            title: "Busiest neighbourhoods by reserved days per month",
            frame: busiest_neighbourhoods(&listings)?,
        },
    ])
}

fn descending() -> SortOptions {
    SortOptions {
        descending: true,
        ..Default::default()
    }
}

/// Mean of `1 - availability_365 / 365` per room type, over listings whose
/// availability is known.
pub fn booking_rate_by_room_type(listings: &DataFrame) -> Result<DataFrame, Error> {
    let frame = listings
        .clone()
        .lazy()
        .filter(col("availability_365").is_not_null())
        .with_column((lit(1.0) - col("availability_365") / lit(365.0)).alias("annual_booking_rate"))
        .groupby([col("room_type")])
        .agg([col("annual_booking_rate").mean().alias("avg_booking_rate")])
        .sort("avg_booking_rate", descending())
        .collect()?;
    Ok(frame)
}

/// Median review count across every listing; unknown counts fold to zero.
pub fn median_reviews(listings: &DataFrame) -> Result<DataFrame, Error> {
    let frame = listings
        .clone()
        .lazy()
        .select([col("number_of_reviews")
            .fill_null(lit(0))
            .median()
            .alias("median_reviews")])
        .collect()?;
    Ok(frame)
}

/// Median review count per room type; unknown counts stay null here so a
/// sparsely reviewed category is not dragged to zero.
pub fn median_reviews_by_room_type(listings: &DataFrame) -> Result<DataFrame, Error> {
    let frame = listings
        .clone()
        .lazy()
        .groupby([col("room_type")])
        .agg([col("number_of_reviews").median().alias("median_reviews")])
        .sort("room_type", SortOptions::default())
        .collect()?;
    Ok(frame)
}

/// Listing density per neighbourhood, densest first.
pub fn listings_per_neighbourhood(listings: &DataFrame) -> Result<DataFrame, Error> {
    let frame = listings
        .clone()
        .lazy()
        .filter(col("neighbourhood_cleansed").is_not_null())
        .groupby([col("neighbourhood_cleansed")])
        .agg([count().alias("listings")])
        .sort("listings", descending())
        .collect()?;
    Ok(frame)
}

/// Estimated reserved days per month, `(1 - availability_365 / 365) * 30`,
/// averaged per neighbourhood.
pub fn busiest_neighbourhoods(listings: &DataFrame) -> Result<DataFrame, Error> {
    let frame = listings
        .clone()
        .lazy()
        .filter(
            col("neighbourhood_cleansed")
                .is_not_null()
                .and(col("availability_365").is_not_null()),
        )
        .with_column(
            ((lit(1.0) - col("availability_365") / lit(365.0)) * lit(30.0))
                .alias("reserved_days_per_month"),
        )
        .groupby([col("neighbourhood_cleansed")])
        .agg([col("reserved_days_per_month")
            .mean()
            .alias("avg_reserved_days_per_month")])
        .sort("avg_reserved_days_per_month", descending())
        .collect()?;
    Ok(frame)
}
