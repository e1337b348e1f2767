/// 手の21ランドマークのインデックス
///
/// 順序は固定で全ピア共通。ワイヤフォーマットの契約そのもの。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Joint {
    Wrist = 0,
    ThumbTip = 1,
    ThumbIp = 2,
    ThumbMp = 3,
    ThumbCmc = 4,
    IndexTip = 5,
    IndexDip = 6,
    IndexPip = 7,
    IndexMcp = 8,
    MiddleTip = 9,
    MiddleDip = 10,
    MiddlePip = 11,
    MiddleMcp = 12,
    RingTip = 13,
    RingDip = 14,
    RingPip = 15,
    RingMcp = 16,
    LittleTip = 17,
    LittleDip = 18,
    LittlePip = 19,
    LittleMcp = 20,
}

impl Joint {
    pub const COUNT: usize = 21;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Wrist),
            1 => Some(Self::ThumbTip),
            2 => Some(Self::ThumbIp),
            3 => Some(Self::ThumbMp),
            4 => Some(Self::ThumbCmc),
            5 => Some(Self::IndexTip),
            6 => Some(Self::IndexDip),
            7 => Some(Self::IndexPip),
            8 => Some(Self::IndexMcp),
            9 => Some(Self::MiddleTip),
            10 => Some(Self::MiddleDip),
            11 => Some(Self::MiddlePip),
            12 => Some(Self::MiddleMcp),
            13 => Some(Self::RingTip),
            14 => Some(Self::RingDip),
            15 => Some(Self::RingPip),
            16 => Some(Self::RingMcp),
            17 => Some(Self::LittleTip),
            18 => Some(Self::LittleDip),
            19 => Some(Self::LittlePip),
            20 => Some(Self::LittleMcp),
            _ => None,
        }
    }
}
