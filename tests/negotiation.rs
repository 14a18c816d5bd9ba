use mpeg_probe::{
    probe_bytes, AudioEncoding, AudioFormatSpec, FormatNegotiator, Mp3EncodeNegotiator, MpegDecodeNegotiator,
    MpegEncoding, ProbeError, ProbeOptions, PropertyMap,
};

fn concrete_formats() -> Vec<AudioFormatSpec> {
    let mut formats = Vec::new();
    for rate in [8000.0, 22050.0, 44100.0] {
        for channels in [1, 2] {
            formats.push(AudioFormatSpec::pcm(rate, 16, channels, true, false));
            formats.push(AudioFormatSpec::pcm(rate, 8, channels, false, true));
            formats.push(
                AudioFormatSpec::new(MpegEncoding::Mpeg1L3)
                    .with_sample_rate(rate)
                    .with_channels(channels)
                    .with_frame_rate(rate / 1152.0),
            );
        }
    }
    formats
}

#[test_log::test]
fn wildcards_match_every_concrete_format() {
    for x in concrete_formats() {
        let open = AudioFormatSpec::new(x.encoding);
        assert!(open.matches(&x), "{}", x);
        assert!(x.matches(&open), "{}", x);
        assert!(x.matches(&x), "{}", x);
    }
}

#[test_log::test]
fn matching_is_symmetric() {
    let formats = concrete_formats();
    for a in &formats {
        for b in &formats {
            assert_eq!(a.matches(b), b.matches(a), "{} vs {}", a, b);
        }
    }
}

#[test_log::test]
fn probed_format_is_decodable() {
    let mut data = Vec::new();
    for _ in 0..4 {
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
        data.resize(data.len() + 413, 0);
    }
    let probed = probe_bytes(&data, &ProbeOptions::default()).unwrap().format;

    let decoder = MpegDecodeNegotiator::new();
    let pcm = AudioFormatSpec::new(AudioEncoding::PcmSigned).with_sample_size(16).with_channels(2);
    assert!(decoder.is_conversion_supported(&pcm, &probed));

    let targets = decoder.target_formats(AudioEncoding::PcmSigned, &probed);
    assert!(!targets.is_empty());
    assert!(targets.iter().all(|t| t.sample_rate == Some(44100.0) && t.channels == Some(2)));
}

#[test_log::test]
fn default_target_of_an_open_request() {
    let lame = Mp3EncodeNegotiator::new();
    let source = AudioFormatSpec::pcm(32000.0, 16, 1, true, true);
    let mut props = PropertyMap::new();
    props.insert("bitrate", 96);
    let request = AudioFormatSpec::new(MpegEncoding::Mpeg1L3).with_properties(props);

    assert!(lame.is_conversion_supported(&request, &source));
    let target = lame.default_target_format(&request, &source, false).unwrap();
    assert_eq!(target.sample_rate, Some(32000.0));
    assert_eq!(target.channels, Some(1));
    assert_eq!(target.sample_size_bits, None);
    assert_eq!(target.frame_rate, None);
    assert_eq!(target.properties.get_int("bitrate"), Some(96));
}

#[test_log::test]
fn conflicting_requests_are_illegal() {
    let lame = Mp3EncodeNegotiator::new();
    let source = AudioFormatSpec::pcm(44100.0, 16, 2, true, false);
    let request = AudioFormatSpec::new(MpegEncoding::Mpeg1L3).with_sample_rate(22050.0);
    let err = lame.default_target_format(&request, &source, false).unwrap_err();
    assert!(matches!(err, ProbeError::IllegalFormatRequest(_)));
}
