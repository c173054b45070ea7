use crate::util::formatted_size;

/// Evacuation failure counters of one pause.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct EvacFailureStatistics {
    pub regions_failed: usize,
    pub objects_recorded: usize,
    pub objects_replayed: usize,
    pub duplicates_collapsed: usize,
    pub segments_allocated: usize,
    pub segment_bytes: usize,
}

impl EvacFailureStatistics {
    pub fn account_region(&mut self, recorded: usize, segments: usize, segment_size: usize) {
        self.regions_failed += 1;
        self.objects_recorded += recorded;
        self.segments_allocated += segments;
        self.segment_bytes += segments * segment_size;
    }

    pub fn account_replay(&mut self, recorded: usize, replayed: usize) {
        debug_assert!(replayed <= recorded);
        self.objects_replayed += replayed;
        self.duplicates_collapsed += recorded - replayed;
    }

    pub fn merge(&mut self, other: &Self) {
        self.regions_failed += other.regions_failed;
        self.objects_recorded += other.objects_recorded;
        self.objects_replayed += other.objects_replayed;
        self.duplicates_collapsed += other.duplicates_collapsed;
        self.segments_allocated += other.segments_allocated;
        self.segment_bytes += other.segment_bytes;
    }
}

impl std::fmt::Display for EvacFailureStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Evacuation failure statistics:")?;
        writeln!(f, "  Regions failed: {}", self.regions_failed)?;
        writeln!(f, "  Objects recorded: {}", self.objects_recorded)?;
        writeln!(
            f,
            "  Objects replayed: {} ({} duplicates collapsed)",
            self.objects_replayed, self.duplicates_collapsed
        )?;
        writeln!(
            f,
            "  Log segments: {} ({})",
            self.segments_allocated,
            formatted_size(self.segment_bytes)
        )?;
        Ok(())
    }
}
