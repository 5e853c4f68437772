// FormatSelector - turns raw engine formats into UI-friendly variants
//
// Handles:
// - Audio-only filtering (variants always carry video)
// - Deduplication by (height, fps), first occurrence wins
// - Display labels with resolution, fps, container, codec and size
// - The fallback selector chain handed to the transfer engine

use std::cmp::Ordering;
use std::collections::HashSet;

use super::models::{RawFormat, StreamVariant};
use super::utils::format_size;

/// Height used in the pre-muxed fallback tiers when the requested height is unknown
pub const UNBOUNDED_HEIGHT: u32 = 9999;

/// Container the merged output is written as
pub const MERGE_CONTAINER: &str = "mp4";

/// Arguments for the merge step: copy video, re-encode audio to AAC 192k
pub const MERGE_FFMPEG_ARGS: [&str; 6] = ["-c:v", "copy", "-c:a", "aac", "-b:a", "192k"];

pub struct FormatSelector;

impl FormatSelector {
    /// Build the user-facing variant list from raw descriptors.
    ///
    /// Audio-only descriptors and ones without a format ID are skipped, the
    /// first descriptor seen for a
    /// given (height, fps) pair is kept, and the result is ordered highest
    /// quality first.
    pub fn normalize(formats: &[RawFormat]) -> Vec<StreamVariant> {
        let mut seen: HashSet<(u32, u64)> = HashSet::new();
        let mut variants = Vec::new();

        for fmt in formats {
            if !fmt.has_video() {
                continue;
            }
            // without an id there is nothing to hand back to the engine
            let format_id = match fmt.format_id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => continue,
            };

            let height = fmt.height.unwrap_or(0);
            let frame_rate = fmt.fps.filter(|f| f.is_finite() && *f > 0.0).unwrap_or(0.0);
            if !seen.insert((height, frame_rate.to_bits())) {
                continue;
            }

            variants.push(StreamVariant {
                label: Self::build_label(fmt),
                format_id,
                height,
                frame_rate,
                ext: fmt.ext.clone().unwrap_or_default(),
                vcodec: fmt.vcodec.clone().unwrap_or_default(),
            });
        }

        // stable: ties keep input order
        variants.sort_by(|a, b| {
            b.height
                .cmp(&a.height)
                .then_with(|| b.frame_rate.partial_cmp(&a.frame_rate).unwrap_or(Ordering::Equal))
        });

        variants
    }

    /// `"{resolution}  {fps}fps  |  {EXT}  |  {vcodec}  |  ~{size}"`
    pub fn build_label(fmt: &RawFormat) -> String {
        let resolution = match fmt.resolution.as_deref() {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => format!(
                "{}x{}",
                fmt.width.map_or("?".to_string(), |w| w.to_string()),
                fmt.height.map_or("?".to_string(), |h| h.to_string()),
            ),
        };

        let fps = match fmt.fps {
            Some(f) if f > 0.0 => format!("  {}fps", Self::format_fps(f)),
            _ => String::new(),
        };

        let ext = fmt.ext.as_deref().unwrap_or("?").to_uppercase();
        let vcodec = fmt.vcodec.as_deref().unwrap_or("?");
        let size = format_size(fmt.effective_size());

        format!("{}{}  |  {}  |  {}  |  ~{}", resolution, fps, ext, vcodec, size)
    }

    fn format_fps(fps: f64) -> String {
        if fps.fract() == 0.0 {
            format!("{}", fps as u64)
        } else {
            format!("{}", fps)
        }
    }

    /// Fallback chain for the transfer engine, first satisfiable tier wins:
    ///
    /// 1. chosen video + best AAC audio (m4a)
    /// 2. chosen video + best Opus audio (webm)
    /// 3. chosen video + any best audio
    /// 4. best pre-muxed MP4 at or below the requested height
    /// 5. best pre-muxed stream at or below the requested height
    pub fn selector_tiers(format_id: &str, height: u32) -> [String; 5] {
        let h = if height == 0 { UNBOUNDED_HEIGHT } else { height };
        [
            format!("{}+bestaudio[ext=m4a]", format_id),
            format!("{}+bestaudio[ext=webm]", format_id),
            format!("{}+bestaudio", format_id),
            format!("best[height<={}][ext=mp4]", h),
            format!("best[height<={}]", h),
        ]
    }

    /// The tiers joined with `/`, as the engine's `-f` argument expects
    pub fn selector_chain(format_id: &str, height: u32) -> String {
        Self::selector_tiers(format_id, height).join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_video_format(id: &str, height: u32, fps: f64, vcodec: &str) -> RawFormat {
        RawFormat {
            format_id: Some(id.to_string()),
            ext: Some("mp4".to_string()),
            resolution: Some(format!("{}x{}", height * 16 / 9, height)),
            width: Some(height * 16 / 9),
            height: Some(height),
            fps: if fps > 0.0 { Some(fps) } else { None },
            vcodec: Some(vcodec.to_string()),
            acodec: Some("none".to_string()),
            filesize: Some(2048.0),
            filesize_approx: None,
        }
    }

    fn make_audio_format(id: &str) -> RawFormat {
        RawFormat {
            format_id: Some(id.to_string()),
            ext: Some("m4a".to_string()),
            resolution: Some("audio only".to_string()),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_skips_audio_only() {
        let mut no_codec = make_video_format("x", 480, 30.0, "avc1");
        no_codec.vcodec = None;
        let formats = vec![
            make_audio_format("140"),
            no_codec,
            make_video_format("137", 1080, 30.0, "avc1.640028"),
        ];

        let variants = FormatSelector::normalize(&formats);
        assert_eq!(variants.len(), 1);
        assert!(variants.iter().all(|v| v.vcodec != "none" && !v.vcodec.is_empty()));
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let formats = vec![
            make_video_format("360", 360, 30.0, "avc1"),
            make_video_format("137", 1080, 30.0, "avc1"),
            make_video_format("720", 720, 30.0, "avc1"),
            make_video_format("248", 1080, 30.0, "vp9"),
        ];

        let variants = FormatSelector::normalize(&formats);
        let ids: Vec<&str> = variants.iter().map(|v| v.format_id.as_str()).collect();
        assert_eq!(ids, vec!["137", "720", "360"]);
    }

    #[test]
    fn test_sort_uses_fps_as_tiebreaker() {
        let formats = vec![
            make_video_format("a", 720, 30.0, "avc1"),
            make_video_format("b", 1080, 30.0, "avc1"),
            make_video_format("c", 720, 60.0, "avc1"),
            make_video_format("d", 1080, 60.0, "avc1"),
        ];

        let variants = FormatSelector::normalize(&formats);
        let ids: Vec<&str> = variants.iter().map(|v| v.format_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_same_height_different_fps_both_kept() {
        let formats = vec![
            make_video_format("a", 1080, 30.0, "avc1"),
            make_video_format("b", 1080, 0.0, "avc1"),
        ];
        assert_eq!(FormatSelector::normalize(&formats).len(), 2);
    }

    #[test]
    fn test_skips_descriptors_without_id() {
        let mut no_id = make_video_format("x", 1080, 30.0, "avc1");
        no_id.format_id = None;
        let mut empty_id = make_video_format("", 720, 30.0, "avc1");
        empty_id.format_id = Some(String::new());
        let formats = vec![no_id, empty_id, make_video_format("137", 1080, 30.0, "avc1")];

        let variants = FormatSelector::normalize(&formats);
        let ids: Vec<&str> = variants.iter().map(|v| v.format_id.as_str()).collect();
        // the skipped 1080p descriptor must not claim the (1080, 30) slot
        assert_eq!(ids, vec!["137"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(FormatSelector::normalize(&[]).is_empty());
        assert!(FormatSelector::normalize(&[make_audio_format("140")]).is_empty());
    }

    #[test]
    fn test_label_with_fps() {
        let f = make_video_format("137", 1080, 30.0, "avc1.640028");
        assert_eq!(
            FormatSelector::build_label(&f),
            "1920x1080  30fps  |  MP4  |  avc1.640028  |  ~2.0 KB"
        );
    }

    #[test]
    fn test_label_without_fps_or_size() {
        let mut f = make_video_format("137", 720, 0.0, "vp9");
        f.resolution = None;
        f.filesize = None;
        assert_eq!(FormatSelector::build_label(&f), "1280x720  |  MP4  |  vp9  |  ~~");
    }

    #[test]
    fn test_label_fractional_fps_and_approx_size() {
        let mut f = make_video_format("22", 720, 29.97, "avc1");
        f.filesize = None;
        f.filesize_approx = Some(500.0);
        assert_eq!(
            FormatSelector::build_label(&f),
            "1280x720  29.97fps  |  MP4  |  avc1  |  ~500.0 B"
        );
    }

    #[test]
    fn test_selector_chain_for_known_height() {
        assert_eq!(
            FormatSelector::selector_chain("137", 1080),
            "137+bestaudio[ext=m4a]/137+bestaudio[ext=webm]/137+bestaudio/\
             best[height<=1080][ext=mp4]/best[height<=1080]"
        );
    }

    #[test]
    fn test_selector_chain_unknown_height() {
        let tiers = FormatSelector::selector_tiers("22", 0);
        assert_eq!(tiers[3], "best[height<=9999][ext=mp4]");
        assert_eq!(tiers[4], "best[height<=9999]");
    }

    #[test]
    fn test_any_audio_tier_stays_third_and_unconstrained() {
        // Sources with unusual audio codecs (e.g. only ac-3) fall through to
        // tier 3, which must not gain a container filter.
        let tiers = FormatSelector::selector_tiers("399", 1080);
        assert_eq!(tiers[2], "399+bestaudio");
        assert!(!tiers[2].contains('['));
    }

    #[test]
    fn test_selector_tiers_well_formed() {
        for tier in FormatSelector::selector_tiers("137", 1080) {
            assert!(!tier.contains('/'));
            assert_eq!(tier.matches('[').count(), tier.matches(']').count());
        }
    }
}
