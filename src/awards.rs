use crate::model::PlayerRecord;

/// Rank ladder: (minimum score, minimum points-per-hour, name). Ordered
/// ascending; lookups scan from the top so the first tier whose thresholds
/// are all met is authoritative. Tier 0 always matches.
pub const RANK_TABLE: [(i64, f64, &str); 20] = [
    (i64::MIN, f64::NEG_INFINITY, "Private"),
    (25, 10.0, "Private 1st Class"),
    (50, 12.0, "Corporal"),
    (100, 15.0, "Sergeant"),
    (150, 18.0, "Sergeant 1st Class"),
    (225, 25.0, "Master Sergeant"),
    (360, 28.0, "Sgt. Major"),
    (550, 30.0, "Command Sgt. Major"),
    (750, 32.0, "Warrant Officer"),
    (1050, 35.0, "Chief Warrant Officer"),
    (1500, 40.0, "2nd Lieutenant"),
    (2000, 42.0, "1st Lieutenant"),
    (2800, 50.0, "Captain"),
    (4000, 55.0, "Major"),
    (5800, 60.0, "Lieutenant Colonel"),
    (8000, 65.0, "Colonel"),
    (12000, 70.0, "Brigadier General"),
    (16000, 80.0, "Major General"),
    (22000, 90.0, "Lieutenant General"),
    (32000, 100.0, "5 Star General"),
];

/// Highest rank tier whose score and PPH thresholds are both met.
pub fn rank(score: i64, pph: f64) -> (usize, &'static str) {
    RANK_TABLE
        .iter()
        .enumerate()
        .rev()
        .find(|(_, (min_score, min_pph, _))| score >= *min_score && pph >= *min_pph)
        .map(|(tier, (_, _, name))| (tier, *name))
        .unwrap_or((0, RANK_TABLE[0].2))
}

/// Cosmetic ribbons, each an independent threshold on one counter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Ribbon {
    GamesPlayed50,
    GamesPlayed250,
    GamesPlayed500,
    Victories5,
    Victories20,
    Victories50,
    TopPlayer5,
    TopPlayer20,
}

impl Ribbon {
    pub fn name(&self) -> &'static str {
        match self {
            Ribbon::GamesPlayed50 => "Games Played 50",
            Ribbon::GamesPlayed250 => "Games Played 250",
            Ribbon::GamesPlayed500 => "Games Played 500",
            Ribbon::Victories5 => "Victories 5",
            Ribbon::Victories20 => "Victories 20",
            Ribbon::Victories50 => "Victories 50",
            Ribbon::TopPlayer5 => "Top Player 5",
            Ribbon::TopPlayer20 => "Top Player 20",
        }
    }
}

pub fn ribbons(record: &PlayerRecord) -> Vec<Ribbon> {
    let checks = [
        (record.games >= 50, Ribbon::GamesPlayed50),
        (record.games >= 250, Ribbon::GamesPlayed250),
        (record.games >= 500, Ribbon::GamesPlayed500),
        (record.wins >= 5, Ribbon::Victories5),
        (record.wins >= 20, Ribbon::Victories20),
        (record.wins >= 50, Ribbon::Victories50),
        (record.mvp >= 5, Ribbon::TopPlayer5),
        (record.mvp >= 20, Ribbon::TopPlayer20),
    ];
    checks
        .into_iter()
        .filter_map(|(earned, ribbon)| earned.then_some(ribbon))
        .collect()
}

/// Medal names and their bit in the earned-medals integer.
pub const MEDALS: [(&str, u64); 8] = [
    ("Expert Shooting", 1 << 0),
    ("Expert Demolition", 1 << 1),
    ("Combat Excellence", 1 << 2),
    ("Distinguished Service", 1 << 3),
    ("Meritorious Service", 1 << 4),
    ("Legion of Merit", 1 << 5),
    ("Navy Cross", 1 << 6),
    ("Medal of Honor", 1 << 7),
];

pub fn medal_earned(earned: u64, bit: u64) -> bool {
    earned & bit == bit
}

pub fn medals_earned(earned: u64) -> u32 {
    earned.count_ones()
}

pub fn medal_names(earned: u64) -> Vec<&'static str> {
    MEDALS
        .iter()
        .filter(|(_, bit)| medal_earned(earned, *bit))
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_player_is_a_private() {
        assert_eq!(rank(0, 0.0), (0, "Private"));
    }

    #[test]
    fn both_thresholds_must_hold() {
        // plenty of score but low pph stays low on the ladder
        assert_eq!(rank(40_000, 5.0).1, "Private");
        assert_eq!(rank(40_000, 99.0).1, "Lieutenant General");
        assert_eq!(rank(40_000, 100.0).1, "5 Star General");
    }

    #[test]
    fn highest_satisfying_tier_is_authoritative() {
        assert_eq!(rank(100, 15.0).1, "Sergeant");
        assert_eq!(rank(149, 100.0).1, "Sergeant");
        assert_eq!(rank(150, 18.0).1, "Sergeant 1st Class");
    }

    #[test]
    fn rank_is_monotonic_in_score() {
        let pph = 60.0;
        let mut prev = 0;
        for score in (0..40_000).step_by(7) {
            let (tier, _) = rank(score, pph);
            assert!(tier >= prev, "tier dropped at score {score}");
            prev = tier;
        }
    }

    #[test]
    fn rank_is_monotonic_in_pph() {
        let score = 40_000;
        let mut prev = 0;
        for tenths in 0..1200 {
            let (tier, _) = rank(score, f64::from(tenths) / 10.0);
            assert!(prev <= tier);
            prev = tier;
        }
    }

    #[test]
    fn ribbons_are_independent_thresholds() {
        let mut record = PlayerRecord::new("Vet1", 0);
        assert!(ribbons(&record).is_empty());

        record.games = 250;
        record.wins = 20;
        record.mvp = 4;
        let earned = ribbons(&record);
        assert_eq!(
            earned,
            vec![
                Ribbon::GamesPlayed50,
                Ribbon::GamesPlayed250,
                Ribbon::Victories5,
                Ribbon::Victories20,
            ]
        );
    }

    #[test]
    fn medal_bitmask_membership() {
        let earned = (1 << 0) | (1 << 3) | (1 << 7);
        assert!(medal_earned(earned, 1 << 0));
        assert!(!medal_earned(earned, 1 << 1));
        assert_eq!(medals_earned(earned), 3);
        assert_eq!(
            medal_names(earned),
            vec!["Expert Shooting", "Distinguished Service", "Medal of Honor"]
        );
    }
}
