//! H.263 码流分割与图像头解析集成测试

use bytes::Bytes;
use picsplit::codec::parsers::h263::{
    ChromaQscaleTable, DcScaleTable, FrameEnd, HeaderWarning, PictureFlags, PictureHeader,
    PictureHeaderDecoder, ScanState,
};
use picsplit::codec::{H263Parser, ParserConfig, PictureType};
use picsplit::core::bitwriter::BitWriter;
use picsplit::core::{PicError, Rational};

// ============================================================
// 码流构造工具
// ============================================================

const OPP_PCF: u32 = 1 << 10;
const OPP_UMV: u32 = 1 << 9;
const OPP_SAC: u32 = 1 << 8;
const OPP_OBMC: u32 = 1 << 7;
const OPP_AIC: u32 = 1 << 6;
const OPP_LOOP: u32 = 1 << 5;
const OPP_SS: u32 = 1 << 4;
const OPP_RPS: u32 = 1 << 3;
const OPP_ISD: u32 = 1 << 2;
const OPP_AIV: u32 = 1 << 1;
const OPP_MQ: u32 = 1 << 0;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_psc(bw: &mut BitWriter, tr: u8, format: u32) {
    bw.write_bits(0x20, 22);
    bw.write_bits(u32::from(tr), 8);
    bw.write_bit(1);
    bw.write_bit(0);
    bw.write_bits(0, 3);
    bw.write_bits(format, 3);
}

fn finish_with_payload(bw: BitWriter, payload: usize) -> Vec<u8> {
    let mut data = bw.finish();
    data.resize(data.len() + payload, 0x55);
    data
}

/// H.263v1 图像
fn v1_picture(tr: u8, format: u32, inter: bool, qscale: u32) -> Vec<u8> {
    v1_picture_sized(tr, format, inter, qscale, 80)
}

fn v1_picture_sized(tr: u8, format: u32, inter: bool, qscale: u32, payload: usize) -> Vec<u8> {
    let mut bw = BitWriter::new();
    write_psc(&mut bw, tr, format);
    bw.write_flag(inter);
    bw.write_flag(false); // 长运动矢量
    bw.write_flag(false); // SAC
    bw.write_flag(false); // OBMC
    bw.write_flag(false); // PB 帧
    bw.write_bits(qscale, 5);
    bw.write_bit(0); // CPM
    bw.write_bit(0); // PEI
    finish_with_payload(bw, payload)
}

/// 带 PB 帧尾部的 QCIF v1 图像
///
/// 尾部 (TRB + DBQUANT) 写 `trailer_bits` 个 1, PEI 之后直到数据结束全部为 1.
/// 尾部位数与解码器跳过的位数不一致时, PEI 会落在 1 上而无法终止.
fn v1_pb_picture(qscale: u32, trailer_bits: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    write_psc(&mut bw, 0, 2);
    bw.write_flag(true); // P
    bw.write_flag(false); // 长运动矢量
    bw.write_flag(false); // SAC
    bw.write_flag(false); // OBMC
    bw.write_flag(true); // PB 帧
    bw.write_bits(qscale, 5);
    bw.write_bit(0); // CPM
    bw.write_bits(u32::MAX, trailer_bits);
    bw.write_bit(0); // PEI
    while bw.bits_written() % 8 != 0 {
        bw.write_bit(1);
    }
    let mut data = bw.finish();
    data.resize(data.len() + 40, 0xFF);
    data
}

/// H.263+ 图像描述
#[derive(Debug, Clone)]
struct PlusPicture {
    tr: u8,
    ufep: u32,
    source_format: u32,
    opptype: u32,
    picture_code: u32,
    no_rounding: bool,
    custom_size: (u32, u32, u32),
    par: (u8, u8),
    clock: (u32, u32),
    uui: u32,
    slice_bits: (bool, bool),
    qscale: u32,
    pei: Vec<u8>,
    sepb1: bool,
    mba: (u32, u32),
    payload: usize,
}

impl Default for PlusPicture {
    fn default() -> Self {
        Self {
            tr: 0,
            ufep: 1,
            source_format: 3,
            opptype: 0,
            picture_code: 0,
            no_rounding: false,
            custom_size: (2, 87, 72),
            par: (0, 0),
            clock: (1, 60),
            uui: 1,
            slice_bits: (false, false),
            qscale: 10,
            pei: Vec::new(),
            sepb1: true,
            mba: (0, 9),
            payload: 80,
        }
    }
}

impl PlusPicture {
    fn encode(&self) -> Vec<u8> {
        let mut bw = BitWriter::new();
        write_psc(&mut bw, self.tr, 7);
        bw.write_bits(self.ufep, 3);
        if self.ufep == 1 {
            bw.write_bits(self.source_format, 3);
            bw.write_bits(self.opptype, 11);
            bw.write_bit(1); // 防起始码仿真
            bw.write_bits(0, 3);
        }
        bw.write_bits(self.picture_code, 3);
        bw.write_bits(0, 2);
        bw.write_flag(self.no_rounding);
        bw.write_bits(0, 4);

        let pcf = self.opptype & OPP_PCF != 0;
        if self.ufep == 1 {
            if self.source_format == 6 {
                let (aspect, vw, vh) = self.custom_size;
                bw.write_bits(aspect, 4);
                bw.write_bits(vw, 9);
                bw.write_bit(1);
                bw.write_bits(vh, 9);
                if aspect == 15 {
                    bw.write_bits(u32::from(self.par.0), 8);
                    bw.write_bits(u32::from(self.par.1), 8);
                }
            }
            if pcf {
                bw.write_bits(self.clock.0, 1);
                bw.write_bits(self.clock.1, 7);
            }
        }
        if pcf {
            bw.write_bits(0, 2); // ETR
        }
        if self.ufep == 1 {
            if self.opptype & OPP_UMV != 0 {
                bw.write_bits(self.uui, 1);
                if self.uui == 0 {
                    bw.write_bit(1);
                }
            }
            if self.opptype & OPP_SS != 0 {
                bw.write_flag(self.slice_bits.0);
                bw.write_flag(self.slice_bits.1);
            }
            if self.picture_code == 3 {
                bw.write_bits(1, 4); // ELNUM
                bw.write_bits(1, 4); // RLNUM
            }
        }
        bw.write_bits(self.qscale, 5);
        if self.picture_code == 2 {
            bw.write_bits(0b101, 3); // TRB
            if pcf {
                bw.write_bits(0b11, 2); // ETR
            }
            bw.write_bits(0b10, 2); // DBQUANT
        }
        bw.write_extension_bytes(&self.pei);
        if self.opptype & OPP_SS != 0 {
            bw.write_flag(self.sepb1);
            bw.write_bits(self.mba.0, self.mba.1);
            bw.write_bit(1);
        }
        finish_with_payload(bw, self.payload)
    }
}

/// 混合 v1 与 H.263+ 图像的测试码流
fn mixed_stream() -> (Vec<u8>, Vec<usize>) {
    let pictures = vec![
        v1_picture(0, 2, false, 8),
        v1_picture(1, 2, true, 9),
        PlusPicture {
            tr: 2,
            source_format: 6,
            opptype: OPP_AIC | OPP_MQ | OPP_PCF,
            custom_size: (15, 87, 72),
            par: (16, 15),
            ..PlusPicture::default()
        }
        .encode(),
        PlusPicture {
            tr: 3,
            ufep: 0,
            opptype: OPP_AIC | OPP_MQ | OPP_PCF,
            picture_code: 1,
            payload: 30,
            ..PlusPicture::default()
        }
        .encode(),
        PlusPicture {
            tr: 4,
            picture_code: 3,
            opptype: OPP_SS | OPP_UMV,
            mba: (30, 9),
            ..PlusPicture::default()
        }
        .encode(),
        v1_picture(5, 3, true, 31),
    ];
    let mut offsets = Vec::new();
    let mut stream = Vec::new();
    for p in &pictures {
        offsets.push(stream.len());
        stream.extend_from_slice(p);
    }
    (stream, offsets)
}

/// 分割结果: (图像字节, 图像头或错误信息)
type Split = Vec<(Bytes, Result<PictureHeader, String>)>;

/// 按给定切分点送入解析器, 遵守 consumed 约定
fn split_with_cuts(stream: &[u8], cuts: &[usize], config: ParserConfig) -> Split {
    let mut parser = H263Parser::with_config(config);
    let mut out = Vec::new();
    let mut bounds = vec![0];
    bounds.extend_from_slice(cuts);
    bounds.push(stream.len());

    for w in bounds.windows(2) {
        let mut rest = &stream[w[0]..w[1]];
        while !rest.is_empty() {
            let res = parser.split_and_parse(rest).expect("分割调用不应失败");
            let consumed = res.consumed;
            let got = res.packet.is_some();
            if let Some(pkt) = res.packet {
                out.push((
                    pkt.to_bytes(),
                    pkt.header.map_err(|e| e.to_string()),
                ));
            }
            assert!(consumed > 0 || got, "调用必须前进或交付图像");
            rest = &rest[consumed..];
        }
    }

    let res = parser.split_and_parse(&[]).expect("刷新不应失败");
    assert!(res.end_of_stream);
    if let Some(pkt) = res.packet {
        out.push((pkt.to_bytes(), pkt.header.map_err(|e| e.to_string())));
    }
    out
}

fn split_chunked(stream: &[u8], chunk_size: usize) -> Split {
    let cuts: Vec<usize> = (chunk_size..stream.len()).step_by(chunk_size).collect();
    split_with_cuts(stream, &cuts, ParserConfig::default())
}

// ============================================================
// 分割
// ============================================================

#[test]
fn test_split_whole_stream() {
    init_logger();
    let (stream, offsets) = mixed_stream();
    let frames = split_with_cuts(&stream, &[], ParserConfig::default());

    assert_eq!(frames.len(), offsets.len(), "每幅图像应交付一次");
    for (i, (data, header)) in frames.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(stream.len());
        assert_eq!(&data[..], &stream[offsets[i]..end], "第 {i} 幅图像字节不一致");
        assert!(header.is_ok(), "第 {i} 幅图像头解析失败: {header:?}");
    }
}

#[test]
fn test_split_is_chunk_size_invariant() {
    let (stream, _) = mixed_stream();
    let reference = split_with_cuts(&stream, &[], ParserConfig::default());

    for chunk_size in (1..=64).chain([97, 128, 255, 1000]) {
        let frames = split_chunked(&stream, chunk_size);
        assert_eq!(frames, reference, "chunk_size={chunk_size} 的分割结果不同");
    }
}

#[test]
fn test_split_every_two_cut_partition() {
    let stream = [
        v1_picture_sized(0, 1, false, 3, 8),
        v1_picture_sized(1, 1, true, 4, 8),
    ]
    .concat();
    let reference = split_with_cuts(&stream, &[], ParserConfig::default());
    assert_eq!(reference.len(), 2);

    for a in 1..stream.len() {
        for b in a + 1..stream.len() {
            let frames = split_with_cuts(&stream, &[a, b], ParserConfig::default());
            assert_eq!(frames, reference, "切分点 ({a}, {b}) 的分割结果不同");
        }
    }
}

#[test]
fn test_start_code_straddling_chunks() {
    let (stream, offsets) = mixed_stream();
    let reference = split_with_cuts(&stream, &[], ParserConfig::default());

    // 第二幅图像的起始码被切在各个位置
    for delta in 1..=3 {
        let cut = offsets[1] + delta;
        let frames = split_with_cuts(&stream, &[cut], ParserConfig::default());
        assert_eq!(frames, reference, "起始码在 +{delta} 处被切开");
    }
    // 起始码三个字节分属三个块
    let cuts = [offsets[2] + 1, offsets[2] + 2];
    assert_eq!(
        split_with_cuts(&stream, &cuts, ParserConfig::default()),
        reference
    );
}

#[test]
fn test_scan_without_start_code_needs_more_data() {
    let mut scan = ScanState::new();
    assert_eq!(scan.find_frame_end(&[0x11; 32]), FrameEnd::NeedMoreData);

    let first = v1_picture(0, 2, false, 8);
    let second = v1_picture(1, 2, true, 8);

    let mut parser = H263Parser::new();
    let out = parser.split_and_parse(&first).unwrap();
    assert_eq!(out.consumed, first.len());
    assert!(out.packet.is_none(), "缺少下一个起始码时不应交付");

    let out = parser.split_and_parse(&second).unwrap();
    assert_eq!(out.consumed, 0);
    let pkt = out.packet.expect("下一个起始码到达后应交付第一幅图像");
    assert_eq!(pkt.data, first.as_slice());
    assert!(pkt.got_picture());
}

#[test]
fn test_flush_delivers_pending_picture() {
    let picture = v1_picture(7, 2, false, 8);
    let mut parser = H263Parser::new();
    parser.split_and_parse(&picture).unwrap();

    let out = parser.split_and_parse(&[]).unwrap();
    assert!(out.end_of_stream);
    let pkt = out.packet.expect("流结束时应交付剩余图像");
    assert_eq!(pkt.size(), picture.len());
    assert_eq!(pkt.picture().map(|h| h.temporal_reference), Some(7));

    // 再次刷新没有数据
    let out = parser.split_and_parse(&[]).unwrap();
    assert!(out.end_of_stream);
    assert!(out.packet.is_none());
}

#[test]
fn test_allocation_failure_drops_accumulation() {
    let picture = v1_picture(0, 2, false, 8);
    let config = ParserConfig::default().with_max_buffer_size(picture.len() + 64);
    let mut parser = H263Parser::with_config(config);

    let err = parser.split_and_parse(&vec![0x11; 4096]).unwrap_err();
    assert!(matches!(err, PicError::ResourceExhausted(_)));
    assert_eq!(parser.assembler().accumulator().index(), 0);

    // 后续正常调用仍然可用
    let out = parser.split_and_parse(&picture).unwrap();
    assert_eq!(out.consumed, picture.len());
    let out = parser.split_and_parse(&[]).unwrap();
    let pkt = out.packet.expect("应交付图像");
    assert!(pkt.got_picture());
    assert_eq!(pkt.data, picture.as_slice());
}

#[test]
fn test_header_failure_still_delivers_packet() {
    let bad = PlusPicture {
        ufep: 2,
        ..PlusPicture::default()
    }
    .encode();
    let stream = [bad.clone(), v1_picture(1, 2, false, 8)].concat();
    let frames = split_with_cuts(&stream, &[], ParserConfig::default());

    assert_eq!(frames.len(), 2);
    assert_eq!(&frames[0].0[..], bad.as_slice());
    assert!(frames[0].1.is_err(), "UFEP=2 应解析失败");
    let second = frames[1].1.as_ref().expect("第二幅图像应解析成功");
    assert_eq!(second.timing.picture_number, 0, "失败的图像头不计数");
}

// ============================================================
// 图像头
// ============================================================

fn decode(data: &[u8]) -> Result<PictureHeader, PicError> {
    PictureHeaderDecoder::default().decode(data)
}

#[test]
fn test_v1_minimal_header() {
    let hdr = decode(&v1_picture(3, 1, false, 12)).unwrap();
    assert_eq!((hdr.width, hdr.height), (128, 96));
    assert_eq!(hdr.picture_type, PictureType::I);
    assert_eq!(hdr.frame_rate, Rational::new(30000, 1001));
    assert_eq!(hdr.qscale, 12);
    assert_eq!(hdr.ufep, 0);
    assert!(hdr.warnings.is_empty());
    assert!(hdr.slice_start.is_none());
}

#[test]
fn test_v1_sac_fatal_plus_sac_warns() {
    let mut bw = BitWriter::new();
    write_psc(&mut bw, 0, 2);
    bw.write_bits(0b00100, 5); // SAC=1
    bw.write_bits(8, 5);
    bw.write_bits(0, 2);
    let err = decode(&finish_with_payload(bw, 40)).unwrap_err();
    assert!(matches!(err, PicError::UnsupportedFeature(_)));

    let hdr = decode(
        &PlusPicture {
            opptype: OPP_SAC | OPP_RPS | OPP_ISD,
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(
        hdr.warnings,
        vec![
            HeaderWarning::SyntaxArithmeticCoding,
            HeaderWarning::ReferencePictureSelection,
            HeaderWarning::IndependentSegmentDecoding,
        ]
    );
}

#[test]
fn test_plus_custom_format_dimensions() {
    let hdr = decode(
        &PlusPicture {
            source_format: 6,
            custom_size: (3, 79, 60),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!((hdr.width, hdr.height), (320, 240));
    assert_eq!((hdr.mb_width, hdr.mb_height, hdr.mb_num), (20, 15, 300));
    assert_eq!(hdr.sample_aspect_ratio, Rational::new(10, 11));
    assert!(hdr.flags.contains(PictureFlags::H263_PLUS | PictureFlags::CUSTOM_FORMAT));
    assert_eq!(hdr.ufep, 1);
}

#[test]
fn test_plus_standard_format_uses_cif_aspect() {
    let hdr = decode(&PlusPicture::default().encode()).unwrap();
    assert_eq!((hdr.width, hdr.height), (352, 288));
    assert_eq!(hdr.sample_aspect_ratio, Rational::new(12, 11));
    assert_eq!(hdr.frame_rate, Rational::new(30000, 1001));
}

#[test]
fn test_plus_extended_aspect_ratio() {
    let hdr = decode(
        &PlusPicture {
            source_format: 6,
            custom_size: (15, 87, 72),
            par: (16, 15),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(hdr.sample_aspect_ratio, Rational::new(16, 15));
}

#[test]
fn test_plus_custom_clock_reduced() {
    let ntsc = decode(
        &PlusPicture {
            opptype: OPP_PCF,
            clock: (1, 60),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(ntsc.frame_rate, Rational::new(30000, 1001));

    let pal = decode(
        &PlusPicture {
            opptype: OPP_PCF,
            clock: (0, 72),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(pal.frame_rate, Rational::new(25, 1));
    assert!(pal.flags.contains(PictureFlags::CUSTOM_PCF));
}

#[test]
fn test_plus_zero_clock_divisor() {
    let err = decode(
        &PlusPicture {
            opptype: OPP_PCF,
            clock: (1, 0),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap_err();
    assert!(matches!(err, PicError::MalformedHeader(_)));
}

#[test]
fn test_plus_malformed_fields() {
    let cases = [
        PlusPicture {
            ufep: 2,
            ..PlusPicture::default()
        },
        PlusPicture {
            picture_code: 4,
            ..PlusPicture::default()
        },
        PlusPicture {
            source_format: 0,
            ..PlusPicture::default()
        },
        PlusPicture {
            source_format: 6,
            custom_size: (2, 87, 0),
            ..PlusPicture::default()
        },
    ];
    for case in cases {
        let err = decode(&case.encode()).unwrap_err();
        assert!(
            matches!(err, PicError::MalformedHeader(_)),
            "{case:?} 应返回 MalformedHeader, actual={err:?}"
        );
    }
}

#[test]
fn test_ufep_zero_inherits_sequence_state() {
    let mut dec = PictureHeaderDecoder::default();
    let first = dec
        .decode(
            &PlusPicture {
                source_format: 6,
                custom_size: (1, 43, 36),
                opptype: OPP_AIC | OPP_LOOP,
                ..PlusPicture::default()
            }
            .encode(),
        )
        .unwrap();
    assert_eq!((first.width, first.height), (176, 144));

    let second = dec
        .decode(
            &PlusPicture {
                ufep: 0,
                picture_code: 1,
                opptype: OPP_AIC | OPP_LOOP,
                ..PlusPicture::default()
            }
            .encode(),
        )
        .unwrap();
    assert_eq!((second.width, second.height), (176, 144));
    assert_eq!(second.sample_aspect_ratio, Rational::new(1, 1));
    assert!(second.flags.contains(
        PictureFlags::ADVANCED_INTRA | PictureFlags::LOOP_FILTER | PictureFlags::UNRESTRICTED_MV
    ));
    assert_eq!(second.picture_type, PictureType::P);
    assert_eq!(second.ufep, 0);
}

#[test]
fn test_ufep_zero_without_prior_header() {
    let err = decode(
        &PlusPicture {
            ufep: 0,
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap_err();
    assert!(matches!(err, PicError::MalformedHeader(_)));
}

#[test]
fn test_picture_types_and_pb_frame() {
    let mut dec = PictureHeaderDecoder::default();
    let codes = [
        (0, PictureType::I, 0),
        (1, PictureType::P, 0),
        (2, PictureType::P, 3),
        (3, PictureType::B, 0),
        (7, PictureType::I, 0),
    ];
    for (code, expected, pb) in codes {
        let hdr = dec
            .decode(
                &PlusPicture {
                    picture_code: code,
                    ..PlusPicture::default()
                }
                .encode(),
            )
            .unwrap();
        assert_eq!(hdr.picture_type, expected, "picture_code={code}");
        assert_eq!(hdr.pb_frame, pb, "picture_code={code}");
    }
}

#[test]
fn test_v1_pb_frame_trailer_skipped() {
    let hdr = decode(&v1_pb_picture(13, 5)).unwrap();
    assert_eq!(hdr.pb_frame, 1);
    assert_eq!(hdr.picture_type, PictureType::P);
    assert_eq!(hdr.qscale, 13);

    // TRB(3) + DBQUANT(2) 少写一位, PEI 无法终止
    let err = decode(&v1_pb_picture(13, 4)).unwrap_err();
    assert!(matches!(err, PicError::InvalidData(_)), "actual={err:?}");
}

/// 改进 PB 帧尾部之后紧跟分片起始, 用 MBA 验证跳过的位数
fn assert_improved_pb_trailer(opptype: u32) {
    let hdr = decode(
        &PlusPicture {
            picture_code: 2,
            opptype: opptype | OPP_SS,
            qscale: 17,
            mba: (300, 9),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(hdr.pb_frame, 3);
    assert_eq!(hdr.qscale, 17);
    let start = hdr.slice_start.expect("分片模式应给出起始位置");
    assert_eq!((start.mb_pos, start.mb_x, start.mb_y), (300, 14, 13));
}

#[test]
fn test_improved_pb_trailer_with_custom_clock() {
    assert_improved_pb_trailer(OPP_PCF);
}

#[test]
fn test_improved_pb_trailer_without_custom_clock() {
    assert_improved_pb_trailer(0);
}

#[test]
fn test_umv_plus_uui_zero_extra_bit() {
    let hdr = decode(
        &PlusPicture {
            opptype: OPP_UMV | OPP_SS,
            uui: 0,
            qscale: 17,
            mba: (300, 9),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert!(hdr.flags.contains(PictureFlags::UMV_PLUS));
    assert!(hdr.warnings.is_empty(), "{:?}", hdr.warnings);
    assert_eq!(hdr.qscale, 17);
    assert_eq!(hdr.slice_start.map(|s| s.mb_pos), Some(300));
}

#[test]
fn test_b_picture_timing_clamp() {
    let mut dec = PictureHeaderDecoder::default();
    let i = dec.decode(&PlusPicture::default().encode()).unwrap();
    assert_eq!(i.timing.time, 0);
    assert_eq!(i.timing.pp_time, 0);

    let b = dec
        .decode(
            &PlusPicture {
                picture_code: 3,
                ..PlusPicture::default()
            }
            .encode(),
        )
        .unwrap();
    assert_eq!(b.timing.time, 1);
    assert_eq!((b.timing.pp_time, b.timing.pb_time), (2, 1));

    let p = dec
        .decode(
            &PlusPicture {
                picture_code: 1,
                ..PlusPicture::default()
            }
            .encode(),
        )
        .unwrap();
    assert_eq!(p.timing.time, 2);
    assert_eq!(p.timing.pp_time, 2);
    assert_eq!(p.timing.last_non_b_time, 2);
    assert_eq!(dec.picture_number(), 3);
}

#[test]
fn test_slice_structured_mba() {
    let hdr = decode(
        &PlusPicture {
            opptype: OPP_SS,
            slice_bits: (true, true),
            mba: (30, 9),
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    let start = hdr.slice_start.expect("分片模式应给出起始位置");
    assert_eq!((start.mb_pos, start.mb_x, start.mb_y), (30, 8, 1));
    assert_eq!(
        hdr.warnings,
        vec![HeaderWarning::RectangularSlices, HeaderWarning::UnorderedSlices]
    );
}

#[test]
fn test_slice_marker_failure() {
    let err = decode(
        &PlusPicture {
            opptype: OPP_SS,
            sepb1: false,
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap_err();
    assert!(matches!(err, PicError::MalformedHeader(_)));
}

#[test]
fn test_pei_extension_bytes_are_skipped() {
    let hdr = decode(
        &PlusPicture {
            pei: vec![0xAB, 0xCD, 0x01],
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(hdr.qscale, 10);
}

#[test]
fn test_area_budget_too_small() {
    let err = decode(
        &PlusPicture {
            source_format: 5,
            payload: 8,
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap_err();
    assert!(matches!(err, PicError::InvalidData(_)));
}

#[test]
fn test_modified_quant_and_aic_tables() {
    let hdr = decode(
        &PlusPicture {
            opptype: OPP_MQ | OPP_AIC | OPP_AIV | OPP_OBMC,
            qscale: 20,
            no_rounding: true,
            ..PlusPicture::default()
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(hdr.chroma_qscale_table, ChromaQscaleTable::ModifiedQuant);
    assert_eq!(hdr.chroma_qscale, 13);
    assert_eq!(hdr.dc_scale_table, DcScaleTable::AdvancedIntra);
    assert_eq!(hdr.dc_scale_table.dc_scale(hdr.qscale), 40);
    assert!(hdr.no_rounding());

    let line = hdr.to_string();
    assert!(line.starts_with("qp:20 I size:"), "{line}");
    assert!(line.contains("rnd:0 AP + AIC AIV MQ"), "{line}");
}

#[test]
fn test_rtp_prefix_warns() {
    let mut data = vec![0x80];
    data.extend(v1_picture(0, 2, false, 8));
    let hdr = decode(&data).unwrap();
    assert_eq!(hdr.warnings, vec![HeaderWarning::RtpHeaderSuspected]);
}

#[test]
fn test_zygo_trailer_consumed() {
    let picture = PlusPicture {
        picture_code: 7,
        payload: 128,
        ..PlusPicture::default()
    }
    .encode();
    let mut dec = PictureHeaderDecoder::new(Some(*b"ZYGO"));
    let hdr = dec.decode(&picture).unwrap();
    assert_eq!(hdr.picture_type, PictureType::I);

    // 私有尾部不足时忽略
    let short = PlusPicture {
        picture_code: 7,
        payload: 60,
        ..PlusPicture::default()
    }
    .encode();
    assert!(dec.decode(&short).is_ok());
}
