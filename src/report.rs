use std::fmt;

use mongodb::bson::{doc, Bson, Document};
use mongodb::options::FindOptions;

use crate::conversion::{bson_number, bson_scalar_string};
use crate::error::Error;

/// A host qualifies as "big" above this many listings.
pub const BIG_HOST_THRESHOLD: i64 = 100;

/// The queries the report needs from a listings collection.
/// `ListingStore` implements this against mongod; tests script it in
/// memory, the same seam the poller has with `StatusProbe`.
pub trait ListingSource {
    fn collection_name(&self) -> &str;
    fn count(&self, filter: Option<Document>) -> Result<u64, Error>;
    fn distinct(&self, field: &str, filter: Option<Document>) -> Result<Vec<Bson>, Error>;
    fn find_one(&self, filter: Option<Document>) -> Result<Option<Document>, Error>;
    fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, Error>;
    fn find(&self, filter: Option<Document>, options: FindOptions) -> Result<Vec<Document>, Error>;
}

/// `round(100 * part / total, 2)`. `None` when the denominator is zero;
/// callers decide whether that is reachable.
pub fn percentage(part: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let raw = part as f64 * 100.0 / total as f64;
    Some((raw * 100.0).round() / 100.0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTypeCount {
    pub room_type: String,
    pub listings: i64,
}

impl RoomTypeCount {
    fn from_group(doc: &Document) -> Self {
        RoomTypeCount {
            room_type: doc
                .get("_id")
                .map(bson_scalar_string)
                .unwrap_or_else(|| "null".to_string()),
            listings: doc.get("count").and_then(bson_number::<i64>).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewedListing {
    pub name: String,
    pub reviews: i64,
}

impl ReviewedListing {
    fn from_document(doc: &Document) -> Self {
        ReviewedListing {
            name: doc.get_str("name").unwrap_or("(unnamed)").to_string(),
            reviews: doc
                .get("number_of_reviews")
                .and_then(bson_number::<i64>)
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigHost {
    pub host_id: String,
    pub host_name: String,
    pub listings: i64,
}

impl BigHost {
    fn from_group(doc: &Document) -> Self {
        BigHost {
            host_id: doc
                .get("_id")
                .map(bson_scalar_string)
                .unwrap_or_else(|| "null".to_string()),
            host_name: doc.get_str("host_name").unwrap_or("(unnamed)").to_string(),
            listings: doc
                .get("total_listings")
                .and_then(bson_number::<i64>)
                .unwrap_or(0),
        }
    }
}

/// One completed step of the report. Computation lives in [`Sections`];
/// rendering lives here, so either side can be exercised on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportSection {
    Sample(Document),
    RoomTypes(Vec<RoomTypeCount>),
    TopReviewed(Vec<ReviewedListing>),
    DistinctHosts(usize),
    InstantBookable {
        bookable: u64,
        total: u64,
        share: f64,
    },
    BigHosts {
        hosts: Vec<BigHost>,
        distinct_hosts: usize,
        share: f64,
    },
    Superhosts {
        superhosts: usize,
        distinct_hosts: usize,
        share: f64,
    },
}

impl ReportSection {
    fn lines(&self) -> Vec<String> {
        match self {
            ReportSection::Sample(doc) => {
                vec![" ---- Sample listing ---- ".to_string(), doc.to_string()]
            }
            ReportSection::RoomTypes(counts) => {
                let mut lines = vec![" ---- Listings per room type ---- ".to_string()];
                lines.extend(
                    counts
                        .iter()
                        .map(|c| format!("{}: {}", c.room_type, c.listings)),
                );
                lines
            }
            ReportSection::TopReviewed(listings) => {
                let mut lines = vec![" ---- Top 5 most reviewed listings ---- ".to_string()];
                lines.extend(
                    listings
                        .iter()
                        .map(|l| format!("{} -> {} reviews", l.name, l.reviews)),
                );
                lines
            }
            ReportSection::DistinctHosts(count) => {
                vec![" ---- Distinct hosts ---- ".to_string(), count.to_string()]
            }
            ReportSection::InstantBookable {
                bookable,
                total,
                share,
            } => vec![
                " ---- Instantly bookable listings ---- ".to_string(),
                format!("instantly bookable: {} of {}", bookable, total),
                format!("share: {:.2}%", share),
            ],
            ReportSection::BigHosts {
                hosts,
                distinct_hosts,
                share,
            } => {
                let mut lines =
                    vec![" ---- Hosts with more than 100 listings ---- ".to_string()];
                lines.extend(
                    hosts
                        .iter()
                        .map(|h| format!("{} ({}) -> {} listings", h.host_name, h.host_id, h.listings)),
                );
                lines.push(format!("qualifying hosts: {}", hosts.len()));
                lines.push(format!(
                    "share of {} distinct hosts: {:.2}%",
                    distinct_hosts, share
                ));
                lines
            }
            ReportSection::Superhosts {
                superhosts,
                distinct_hosts,
                share,
            } => vec![
                " ---- Distinct superhosts ---- ".to_string(),
                format!("superhosts: {}", superhosts),
                format!("share of {} distinct hosts: {:.2}%", distinct_hosts, share),
            ],
        }
    }
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Runs the seven report steps against a collection already confirmed to be
/// on a primary node. Construction fails on an empty collection; waiting
/// will never fix that, unlike readiness.
#[derive(Debug)]
pub struct ReportRunner<'a, S: ListingSource> {
    store: &'a S,
    total: u64,
}

impl<'a, S: ListingSource> ReportRunner<'a, S> {
    pub fn new(store: &'a S) -> Result<Self, Error> {
        let total = store.count(None)?;
        if total == 0 {
            return Err(Error::EmptyCollection {
                collection: store.collection_name().to_string(),
            });
        }
        Ok(ReportRunner { store, total })
    }

    pub fn total_listings(&self) -> u64 {
        self.total
    }

    /// Lazily computed sections, in report order, so each one prints as it
    /// completes. The first failed step halts the iteration.
    pub fn sections(&'a self) -> Sections<'a, S> {
        Sections {
            runner: self,
            step: 0,
            distinct_hosts: None,
            halted: false,
        }
    }
}

const STEPS: u8 = 7;

pub struct Sections<'a, S: ListingSource> {
    runner: &'a ReportRunner<'a, S>,
    step: u8,
    // Cardinality from the distinct-hosts step, reused as the denominator of
    // the big-host and superhost shares.
    distinct_hosts: Option<usize>,
    halted: bool,
}

impl<S: ListingSource> Sections<'_, S> {
    fn sample(&self) -> Result<ReportSection, Error> {
        let doc = self
            .runner
            .store
            .find_one(None)?
            .ok_or_else(|| Error::EmptyCollection {
                collection: self.runner.store.collection_name().to_string(),
            })?;
        Ok(ReportSection::Sample(doc))
    }

    fn room_types(&self) -> Result<ReportSection, Error> {
        let rows = self.runner.store.aggregate(vec![
            doc! { "$group": { "_id": "$room_type", "count": { "$sum": 1 } } },
            // secondary key keeps ties deterministic
            doc! { "$sort": { "count": -1, "_id": 1 } },
        ])?;
        Ok(ReportSection::RoomTypes(
            rows.iter().map(RoomTypeCount::from_group).collect(),
        ))
    }

    fn top_reviewed(&self) -> Result<ReportSection, Error> {
        let options = FindOptions::builder()
            .projection(doc! { "name": 1, "number_of_reviews": 1, "_id": 0 })
            .sort(doc! { "number_of_reviews": -1 })
            .limit(5)
            .build();
        let rows = self.runner.store.find(
            Some(doc! { "number_of_reviews": { "$exists": true } }),
            options,
        )?;
        Ok(ReportSection::TopReviewed(
            rows.iter().map(ReviewedListing::from_document).collect(),
        ))
    }

    fn distinct_hosts(&mut self) -> Result<usize, Error> {
        if let Some(count) = self.distinct_hosts {
            return Ok(count);
        }
        let count = self.runner.store.distinct("host_id", None)?.len();
        self.distinct_hosts = Some(count);
        Ok(count)
    }

    fn instant_bookable(&self) -> Result<ReportSection, Error> {
        let bookable = self
            .runner
            .store
            .count(Some(doc! { "instant_bookable": "t" }))?;
        let total = self.runner.total;
        let share = percentage(bookable, total).ok_or(Error::ZeroDenominator("total listings"))?;
        Ok(ReportSection::InstantBookable {
            bookable,
            total,
            share,
        })
    }

    fn big_hosts(&mut self) -> Result<ReportSection, Error> {
        let rows = self.runner.store.aggregate(vec![
            doc! { "$group": {
                "_id": "$host_id",
                "total_listings": { "$sum": 1 },
                "host_name": { "$first": "$host_name" },
            } },
            doc! { "$match": { "total_listings": { "$gt": BIG_HOST_THRESHOLD } } },
            doc! { "$sort": { "total_listings": -1 } },
        ])?;
        let hosts: Vec<BigHost> = rows.iter().map(BigHost::from_group).collect();

        let distinct_hosts = self.distinct_hosts()?;
        let share = percentage(hosts.len() as u64, distinct_hosts as u64)
            .ok_or(Error::ZeroDenominator("distinct hosts"))?;
        Ok(ReportSection::BigHosts {
            hosts,
            distinct_hosts,
            share,
        })
    }

    fn superhosts(&mut self) -> Result<ReportSection, Error> {
        let superhosts = self
            .runner
            .store
            .distinct("host_id", Some(doc! { "host_is_superhost": "t" }))?
            .len();

        let distinct_hosts = self.distinct_hosts()?;
        let share = percentage(superhosts as u64, distinct_hosts as u64)
            .ok_or(Error::ZeroDenominator("distinct hosts"))?;
        Ok(ReportSection::Superhosts {
            superhosts,
            distinct_hosts,
            share,
        })
    }
}

impl<S: ListingSource> Iterator for Sections<'_, S> {
    type Item = Result<ReportSection, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted || self.step >= STEPS {
            return None;
        }
        self.step += 1;

        let section = match self.step {
            1 => self.sample(),
            2 => self.room_types(),
            3 => self.top_reviewed(),
            4 => self.distinct_hosts().map(ReportSection::DistinctHosts),
            5 => self.instant_bookable(),
            6 => self.big_hosts(),
            7 => self.superhosts(),
            _ => unreachable!("report has exactly {STEPS} steps"),
        };

        if section.is_err() {
            self.halted = true;
        }
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use mongodb::bson::bson;

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(2, 10), Some(20.0));
        assert_eq!(percentage(1, 3), Some(33.33));
        assert_eq!(percentage(2, 3), Some(66.67));
        assert_eq!(percentage(0, 7), Some(0.0));
        assert_eq!(percentage(7, 7), Some(100.0));
    }

    #[test]
    fn percentage_of_nothing_is_a_defined_error_value() {
        assert_eq!(percentage(3, 0), None);
        assert_eq!(percentage(0, 0), None);
    }

    #[test]
    fn percentage_depends_only_on_its_inputs() {
        let first = percentage(57, 1200);
        let again = percentage(57, 1200);
        assert_eq!(first, again);
        assert_eq!(first, Some(4.75));
    }

    #[test]
    fn room_type_groups_convert_in_pipeline_order() {
        // grouped counts for ["Entire home", "Private room", "Entire home"]
        let rows = vec![
            doc! { "_id": "Entire home", "count": 2 },
            doc! { "_id": "Private room", "count": 1 },
        ];
        let counts: Vec<RoomTypeCount> = rows.iter().map(RoomTypeCount::from_group).collect();
        assert_eq!(
            counts,
            vec![
                RoomTypeCount {
                    room_type: "Entire home".to_string(),
                    listings: 2
                },
                RoomTypeCount {
                    room_type: "Private room".to_string(),
                    listings: 1
                },
            ]
        );
    }

    #[test]
    fn missing_room_type_groups_under_null() {
        let row = doc! { "_id": Bson::Null, "count": 4 };
        let count = RoomTypeCount::from_group(&row);
        assert_eq!(count.room_type, "null");
        assert_eq!(count.listings, 4);
    }

    #[test]
    fn reviewed_listing_tolerates_string_counts() {
        let row = doc! { "name": "Cosy loft", "number_of_reviews": "42" };
        let listing = ReviewedListing::from_document(&row);
        assert_eq!(listing.reviews, 42);
        assert_eq!(listing.name, "Cosy loft");
    }

    #[test]
    fn big_host_group_reads_numeric_ids_and_i32_sums() {
        let row = doc! {
            "_id": bson!(4739),
            "total_listings": 150,
            "host_name": "Marie",
        };
        let host = BigHost::from_group(&row);
        assert_eq!(host.host_id, "4739");
        assert_eq!(host.host_name, "Marie");
        assert_eq!(host.listings, 150);
    }

    #[test]
    fn instant_bookable_section_renders_share_with_percent_sign() {
        let section = ReportSection::InstantBookable {
            bookable: 2,
            total: 10,
            share: percentage(2, 10).unwrap(),
        };
        let rendered = section.to_string();
        assert!(rendered.contains("instantly bookable: 2 of 10"));
        assert!(rendered.contains("share: 20.00%"));
    }

    #[test]
    fn big_hosts_section_reports_only_hosts_over_threshold() {
        // server-side $match keeps the 150-listing host and drops the 80
        let hosts = vec![BigHost {
            host_id: "4739".to_string(),
            host_name: "Marie".to_string(),
            listings: 150,
        }];
        let distinct_hosts = 1200;
        let section = ReportSection::BigHosts {
            share: percentage(hosts.len() as u64, distinct_hosts).unwrap(),
            hosts,
            distinct_hosts: distinct_hosts as usize,
        };
        let rendered = section.to_string();
        assert!(rendered.contains("Marie (4739) -> 150 listings"));
        assert!(rendered.contains("qualifying hosts: 1"));
        assert!(rendered.contains("share of 1200 distinct hosts: 0.08%"));
    }

    #[test]
    fn superhost_share_uses_the_distinct_host_denominator() {
        let section = ReportSection::Superhosts {
            superhosts: 57,
            distinct_hosts: 1200,
            share: percentage(57, 1200).unwrap(),
        };
        let rendered = section.to_string();
        assert!(rendered.contains("superhosts: 57"));
        assert!(rendered.contains("share of 1200 distinct hosts: 4.75%"));
    }

    #[test]
    fn room_types_section_renders_one_line_per_group() {
        let section = ReportSection::RoomTypes(vec![
            RoomTypeCount {
                room_type: "Entire home".to_string(),
                listings: 2,
            },
            RoomTypeCount {
                room_type: "Private room".to_string(),
                listings: 1,
            },
        ]);
        assert_eq!(
            section.to_string(),
            " ---- Listings per room type ---- \nEntire home: 2\nPrivate room: 1"
        );
    }

    /// In-memory collection answering each report query from fixed fixtures
    /// and counting what gets issued. Aggregations are told apart by their
    /// `$group` key, the only shape the report sends.
    #[derive(Debug, Default)]
    struct ScriptedStore {
        total: u64,
        sample: Option<Document>,
        room_groups: Vec<Document>,
        top_rows: Vec<Document>,
        bookable: u64,
        host_ids: Vec<Bson>,
        big_host_groups: Vec<Document>,
        superhost_ids: Vec<Bson>,
        fail_aggregates: bool,
        count_calls: Cell<u32>,
        find_one_calls: Cell<u32>,
        aggregate_calls: Cell<u32>,
        distinct_host_calls: Cell<u32>,
        superhost_distinct_calls: Cell<u32>,
        find_calls: Cell<u32>,
    }

    impl ListingSource for ScriptedStore {
        fn collection_name(&self) -> &str {
            "utilisateurs"
        }

        fn count(&self, filter: Option<Document>) -> Result<u64, Error> {
            self.count_calls.set(self.count_calls.get() + 1);
            Ok(match filter {
                None => self.total,
                Some(_) => self.bookable,
            })
        }

        fn distinct(&self, _field: &str, filter: Option<Document>) -> Result<Vec<Bson>, Error> {
            match filter {
                None => {
                    self.distinct_host_calls
                        .set(self.distinct_host_calls.get() + 1);
                    Ok(self.host_ids.clone())
                }
                Some(_) => {
                    self.superhost_distinct_calls
                        .set(self.superhost_distinct_calls.get() + 1);
                    Ok(self.superhost_ids.clone())
                }
            }
        }

        fn find_one(&self, _filter: Option<Document>) -> Result<Option<Document>, Error> {
            self.find_one_calls.set(self.find_one_calls.get() + 1);
            Ok(self.sample.clone())
        }

        fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, Error> {
            self.aggregate_calls.set(self.aggregate_calls.get() + 1);
            if self.fail_aggregates {
                return Err(Error::Config("aggregate refused".to_string()));
            }
            let key = pipeline
                .first()
                .and_then(|stage| stage.get_document("$group").ok())
                .and_then(|group| group.get_str("_id").ok())
                .unwrap_or_default();
            Ok(match key {
                "$room_type" => self.room_groups.clone(),
                "$host_id" => self.big_host_groups.clone(),
                _ => Vec::new(),
            })
        }

        fn find(
            &self,
            _filter: Option<Document>,
            _options: FindOptions,
        ) -> Result<Vec<Document>, Error> {
            self.find_calls.set(self.find_calls.get() + 1);
            Ok(self.top_rows.clone())
        }
    }

    fn scripted_store() -> ScriptedStore {
        ScriptedStore {
            total: 10,
            sample: Some(doc! { "name": "Cosy loft", "room_type": "Entire home" }),
            room_groups: vec![
                doc! { "_id": "Entire home", "count": 2 },
                doc! { "_id": "Private room", "count": 1 },
            ],
            top_rows: vec![doc! { "name": "Cosy loft", "number_of_reviews": 42 }],
            bookable: 2,
            host_ids: vec![bson!(1), bson!(2), bson!(3), bson!(4)],
            big_host_groups: vec![doc! { "_id": 1, "total_listings": 150, "host_name": "Marie" }],
            superhost_ids: vec![bson!(1), bson!(3)],
            ..Default::default()
        }
    }

    #[test]
    fn empty_collection_fails_before_any_report_query() {
        let store = ScriptedStore::default();
        let err = ReportRunner::new(&store).unwrap_err();
        assert!(matches!(err, Error::EmptyCollection { .. }));

        // only the precondition count ran
        assert_eq!(store.count_calls.get(), 1);
        assert_eq!(store.find_one_calls.get(), 0);
        assert_eq!(store.aggregate_calls.get(), 0);
        assert_eq!(store.distinct_host_calls.get(), 0);
        assert_eq!(store.superhost_distinct_calls.get(), 0);
        assert_eq!(store.find_calls.get(), 0);
    }

    #[test]
    fn sections_run_the_full_report_in_order() {
        let store = scripted_store();
        let runner = ReportRunner::new(&store).unwrap();
        let sections: Vec<ReportSection> = runner
            .sections()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(sections.len(), 7);
        assert_eq!(
            sections[1],
            ReportSection::RoomTypes(vec![
                RoomTypeCount {
                    room_type: "Entire home".to_string(),
                    listings: 2
                },
                RoomTypeCount {
                    room_type: "Private room".to_string(),
                    listings: 1
                },
            ])
        );
        assert_eq!(
            sections[2],
            ReportSection::TopReviewed(vec![ReviewedListing {
                name: "Cosy loft".to_string(),
                reviews: 42
            }])
        );
        assert_eq!(
            sections[4],
            ReportSection::InstantBookable {
                bookable: 2,
                total: 10,
                share: 20.0
            }
        );
    }

    #[test]
    fn distinct_host_cardinality_is_queried_once_and_shared() {
        let store = scripted_store();
        let runner = ReportRunner::new(&store).unwrap();
        let sections: Vec<ReportSection> = runner
            .sections()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(store.distinct_host_calls.get(), 1);
        assert_eq!(sections[3], ReportSection::DistinctHosts(4));

        match &sections[5] {
            ReportSection::BigHosts {
                hosts,
                distinct_hosts,
                share,
            } => {
                assert_eq!(*distinct_hosts, 4);
                assert_eq!(hosts.len(), 1);
                assert_eq!(Some(*share), percentage(1, 4));
            }
            other => panic!("expected a big-hosts section, got {other:?}"),
        }
        match &sections[6] {
            ReportSection::Superhosts {
                superhosts,
                distinct_hosts,
                share,
            } => {
                assert_eq!(*superhosts, 2);
                assert_eq!(*distinct_hosts, 4);
                assert_eq!(Some(*share), percentage(2, 4));
            }
            other => panic!("expected a superhost section, got {other:?}"),
        }
    }

    #[test]
    fn failing_step_halts_the_remaining_sections() {
        let store = ScriptedStore {
            fail_aggregates: true,
            ..scripted_store()
        };
        let runner = ReportRunner::new(&store).unwrap();
        let mut sections = runner.sections();

        assert!(matches!(sections.next(), Some(Ok(ReportSection::Sample(_)))));
        // the room-type aggregation fails; nothing after it is issued
        assert!(matches!(sections.next(), Some(Err(_))));
        assert!(sections.next().is_none());
        assert!(sections.next().is_none());

        assert_eq!(store.find_calls.get(), 0);
        assert_eq!(store.distinct_host_calls.get(), 0);
        assert_eq!(store.superhost_distinct_calls.get(), 0);
    }
}
