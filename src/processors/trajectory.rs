//! Movement and gaze trajectories from Unity raw logs.
//!
//! A raw log is walked once. Every sample of the selected tracked object
//! becomes one row, annotated with the room it lies in, how many rooms have
//! been entered so far, and how many items had been interacted with by then
//! according to the paired summary log.

use std::path::Path;

use crate::core::loaders::{
    self, parse_raw_line, LogClock, LogEvent, RawLine, RawSample, Result, SampleSource,
    SummaryLog, SummarySchema,
};
use crate::core::regions::{navigation_region, region_label, Region};
use crate::core::transforms::{displacement, quaternion_to_euler};
use crate::core::writers::{format_float, Record};

/// One annotated raw log sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    /// Ticks since the stream start. The first sample is always 0.
    pub time: i64,
    pub sample: RawSample,
    pub room_by_order: usize,
    pub room: Option<Region>,
    pub items_clicked: i64,
    pub distance_from_last_point: f64,
    pub time_since_last_point: i64,
}

impl TrajectoryPoint {
    /// Euler angles of the sample orientation.
    pub fn euler(&self) -> [f64; 3] {
        let [w, x, y, z] = self.sample.orientation;
        quaternion_to_euler(w, x, y, z)
    }

    /// Row for a path table.
    pub fn path_record(&self, subject_id: &str, trial_number: usize) -> Record {
        let [x, y, z] = self.sample.position;
        let mut row = vec![
            subject_id.to_string(),
            trial_number.to_string(),
            self.time.to_string(),
            format_float(x),
            format_float(y),
            format_float(z),
        ];
        self.push_annotations(&mut row);
        row
    }

    /// Row for a look table: orientation quaternion followed by its Euler angles.
    pub fn look_record(&self, subject_id: &str, trial_number: usize) -> Record {
        let mut row = vec![
            subject_id.to_string(),
            trial_number.to_string(),
            self.time.to_string(),
        ];
        row.extend(self.sample.orientation.iter().map(|&v| format_float(v)));
        row.extend(self.euler().iter().map(|&v| format_float(v)));
        self.push_annotations(&mut row);
        row
    }

    fn push_annotations(&self, row: &mut Record) {
        row.push(self.room_by_order.to_string());
        row.push(region_label(self.room).to_string());
        row.push(self.items_clicked.to_string());
        row.push(format_float(self.distance_from_last_point));
        row.push(self.time_since_last_point.to_string());
    }
}

/// Merge cursor over a summary event stream.
///
/// Advances monotonically; once the stream is exhausted the counter stays
/// at its last value.
#[derive(Debug)]
pub struct InteractionCursor<'a> {
    schema: SummarySchema,
    events: &'a [LogEvent],
    next: usize,
    count: i64,
}

impl<'a> InteractionCursor<'a> {
    pub fn new(summary: &'a SummaryLog) -> Self {
        Self {
            schema: summary.schema,
            events: &summary.events,
            next: 0,
            count: 0,
        }
    }

    /// Consume every event at or before `time` and return the running count.
    pub fn advance(&mut self, time: i64) -> i64 {
        while let Some(event) = self.events.get(self.next) {
            if event.relative_time > time {
                break;
            }
            self.count += self.delta(event);
            self.next += 1;
        }
        self.count
    }

    fn delta(&self, event: &LogEvent) -> i64 {
        match self.schema {
            SummarySchema::StudyPractice => 1,
            SummarySchema::Test => {
                let event_type = event.event_type.to_lowercase();
                if event_type.contains("placed") {
                    1
                } else if event_type.contains("picked") {
                    -1
                } else {
                    0
                }
            }
            SummarySchema::Unknown => 0,
        }
    }
}

/// Counts room changes along a trajectory.
#[derive(Debug, Default)]
pub struct RoomVisits {
    previous: Option<Option<Region>>,
    order: usize,
}

impl RoomVisits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the room of the next sample and return its visit-order index.
    pub fn visit(&mut self, room: Option<Region>) -> usize {
        if let Some(previous) = self.previous {
            if previous != room {
                self.order += 1;
            }
        }
        self.previous = Some(room);
        self.order
    }
}

/// Annotate the samples of `source` in raw log `content`.
///
/// # Arguments
///
/// * `path` - Raw log path, used in error context
/// * `content` - Full raw log text
/// * `source` - Tracked object to extract
/// * `summary` - Paired summary log driving the interaction counter
pub fn parse_trajectory(
    path: &Path,
    content: &str,
    source: SampleSource,
    summary: &SummaryLog,
) -> Result<Vec<TrajectoryPoint>> {
    let mut clock = LogClock::new();
    let mut cursor = InteractionCursor::new(summary);
    let mut visits = RoomVisits::new();
    let mut previous: Option<(i64, [f64; 3])> = None;
    let mut points = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let sample = match parse_raw_line(path, idx + 1, line, source)? {
            RawLine::Clock(ticks) => {
                clock.observe(ticks);
                continue;
            }
            RawLine::Sample(sample) => sample,
            RawLine::Other => continue,
        };

        let (time, previous_time, previous_position) = match previous {
            Some((t, p)) => (clock.current(), t, p),
            None => (0, 0, sample.position),
        };

        let [x, _, z] = sample.position;
        let room = navigation_region(x, z);

        points.push(TrajectoryPoint {
            time,
            sample,
            room_by_order: visits.visit(room),
            room,
            items_clicked: cursor.advance(time),
            distance_from_last_point: displacement(&previous_position, &sample.position),
            time_since_last_point: time - previous_time,
        });

        previous = Some((time, sample.position));
    }

    Ok(points)
}

/// Load a raw log and its paired summary and annotate the samples of `source`.
pub fn load_trajectory(
    raw_log: &Path,
    source: SampleSource,
    summary: &SummaryLog,
) -> Result<Vec<TrajectoryPoint>> {
    let content = loaders::read_log(raw_log)?;
    parse_trajectory(raw_log, &content, source, summary)
}
