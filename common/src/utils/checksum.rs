use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16-CCITT（多项式 0x1021，初值 0xFFFF，不反射）
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// 计算CRC-16校验和
pub fn calculate_checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// 对多段数据连续计算校验和，等价于先拼接再计算
pub fn calculate_checksum_parts(parts: &[&[u8]]) -> u16 {
    let mut digest = CRC16.digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize()
}
