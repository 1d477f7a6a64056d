/// 数据报接收缓冲区
///
/// 容量比数据报上限多一个字节：收到的数据报如果填满了这个多出来的字节，
/// 说明发送方超出了上限，接收方据此丢弃，而不是处理被截断的内容。
pub struct DatagramBuffer {
    buffer: Vec<u8>,
    limit: usize,
    len: usize,
}

impl DatagramBuffer {
    /// 创建一个新的空缓冲区
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: vec![0; limit + 1],
            limit,
            len: 0,
        }
    }

    /// 获取缓冲区的可变引用（整个容量）
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer[..]
    }

    /// 获取有效数据
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// 设置有效数据长度
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.buffer.len());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 数据报上限
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 有效数据是否超过数据报上限
    pub fn is_over_limit(&self) -> bool {
        self.len > self.limit
    }
}
