// Band energy estimation - bass/mid/treble scalars from the magnitude spectrum.
//
// Band bounds map to bin indices via round(f / nyquist * (len - 1)), clamped
// so every band covers at least one bin. The same mapping feeds the beat
// detector so both components agree on what "bass" means.

/// Band frequency bounds in Hz.
pub const BASS_BAND_HZ: (f32, f32) = (20.0, 250.0);
pub const MID_BAND_HZ: (f32, f32) = (250.0, 2000.0);
pub const TREBLE_BAND_HZ: (f32, f32) = (2000.0, 16_000.0);

/// Scalar band energies, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

/// Inclusive bin range for a frequency band, or None when the spectrum is too
/// short to resolve it.
pub fn band_bin_range(
    spectrum_len: usize,
    sample_rate: u32,
    band_hz: (f32, f32),
) -> Option<(usize, usize)> {
    if spectrum_len < 3 || sample_rate == 0 {
        return None;
    }
    let nyquist = sample_rate as f32 / 2.0;
    let last = spectrum_len - 1;
    let start = (((band_hz.0 / nyquist) * last as f32).round() as usize).clamp(1, last - 1);
    let end = (((band_hz.1 / nyquist) * last as f32).round() as usize).clamp(start + 1, last);
    Some((start, end))
}

/// Estimate bass/mid/treble energies from a magnitude spectrum.
///
/// Average magnitude over each band's bins, compressed with sqrt(avg) * 2 and
/// clamped to [0, 1]. Empty or degenerate spectra yield all zeros.
pub fn band_energies(spectrum: &[f32], sample_rate: u32) -> BandEnergies {
    BandEnergies {
        bass: band_energy(spectrum, sample_rate, BASS_BAND_HZ),
        mid: band_energy(spectrum, sample_rate, MID_BAND_HZ),
        treble: band_energy(spectrum, sample_rate, TREBLE_BAND_HZ),
    }
}

fn band_energy(spectrum: &[f32], sample_rate: u32, band_hz: (f32, f32)) -> f32 {
    let Some((start, end)) = band_bin_range(spectrum.len(), sample_rate, band_hz) else {
        return 0.0;
    };
    let count = end - start + 1;
    let sum: f32 = spectrum[start..=end].iter().sum();
    let avg = sum / count as f32;
    (avg.max(0.0).sqrt() * 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_spectrum_yields_zero_bands() {
        let energies = band_energies(&[], 48_000);
        assert_eq!(energies, BandEnergies::default());
    }

    #[test]
    fn test_zero_spectrum_yields_zero_bands() {
        let spectrum = vec![0.0; 512];
        let energies = band_energies(&spectrum, 48_000);
        assert_eq!(energies.bass, 0.0);
        assert_eq!(energies.mid, 0.0);
        assert_eq!(energies.treble, 0.0);
    }

    #[test]
    fn test_bass_heavy_spectrum_reads_as_bass() {
        let mut spectrum = vec![0.0f32; 512];
        let (start, end) = band_bin_range(512, 48_000, BASS_BAND_HZ).unwrap();
        for bin in start..=end {
            spectrum[bin] = 0.2;
        }
        let energies = band_energies(&spectrum, 48_000);
        assert!(energies.bass > 0.5, "bass was {}", energies.bass);
        assert!(energies.mid < energies.bass);
        assert_eq!(energies.treble, 0.0);
    }

    #[test]
    fn test_band_ranges_do_not_collapse() {
        // Even a short spectrum keeps end > start for every band.
        for len in [3usize, 8, 64, 2048] {
            for band in [BASS_BAND_HZ, MID_BAND_HZ, TREBLE_BAND_HZ] {
                let (start, end) = band_bin_range(len, 44_100, band).unwrap();
                assert!(end > start, "len {} band {:?}", len, band);
                assert!(end < len);
            }
        }
    }

    #[test]
    fn test_compression_clamps_to_unit_range() {
        let spectrum = vec![10.0f32; 512];
        let energies = band_energies(&spectrum, 48_000);
        assert_eq!(energies.bass, 1.0);
        assert_eq!(energies.mid, 1.0);
        assert_eq!(energies.treble, 1.0);
    }
}
