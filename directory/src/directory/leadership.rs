/// 领导权状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Leadership {
    Leader,
    #[default]
    NotLeader,
}

impl Leadership {
    pub fn is_leader(self) -> bool {
        self == Leadership::Leader
    }

    /// 返回状态是否发生变化，重复授予是空操作
    pub fn assign(&mut self) -> bool {
        let changed = !self.is_leader();
        *self = Leadership::Leader;
        changed
    }

    pub fn relinquish(&mut self) -> bool {
        let changed = self.is_leader();
        *self = Leadership::NotLeader;
        changed
    }
}
