/// Pubsync timestamp.
///
/// Internally i64 milliseconds from the unix epoch. Milliseconds are the
/// protocol clock unit: publication names carry a millisecond timestamp in
/// their final component and all lifetime arithmetic happens at that
/// granularity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Construct a new timestamp of "now".
    pub fn now() -> Self {
        std::time::SystemTime::now().into()
    }

    /// Construct a timestamp from i64 milliseconds since unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get the i64 milliseconds since unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Signed distance `self - rhs` in milliseconds.
    ///
    /// Negative when `rhs` is in `self`'s future. Publication expiry is a
    /// two-sided window, so callers need the sign.
    pub fn signed_millis_since(&self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}

impl std::ops::Add<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: std::time::Duration) -> Self::Output {
        Timestamp(self.0 + rhs.as_millis() as i64)
    }
}

impl std::ops::Sub<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: std::time::Duration) -> Self::Output {
        Timestamp(self.0 - rhs.as_millis() as i64)
    }
}

impl From<std::time::SystemTime> for Timestamp {
    fn from(t: std::time::SystemTime) -> Self {
        Self(
            t.duration_since(std::time::SystemTime::UNIX_EPOCH)
                .expect("invalid system time")
                .as_millis() as i64,
        )
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
