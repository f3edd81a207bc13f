#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = cmskit_utils::asn1::Decoder::new(data);
    while !decoder.is_empty() {
        match decoder.read_tlv() {
            // BER segments must join without panicking
            Ok(tlv) => {
                let _ = tlv.octets();
            }
            Err(_) => break,
        }
    }
    let _ = cmskit_utils::pem::strip_armor(data);
});
