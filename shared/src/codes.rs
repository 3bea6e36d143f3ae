use std::fmt;

/// Remote procedure selected by a request frame's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CallCode {
    AddBorder = 1,
    AddObstacle = 2,
    GetPath = 3,
    GetWidth = 4,
    GetHeight = 5,
    GetMaxWeight = 6,
    GetMinWeight = 7,
    GetMaxWeightInMap = 8,
    SetWeight = 9,
    GetWeight = 10,
    ResetMap = 11,
    GetWeights = 12,
    GetString = 13,
    SetPos = 14,
    GetPos = 15,
    DebugPrint = 16,
    PathTo = 17,
    PathToLine = 18,
    GetRollPitchYaw = 19,
    SetRollPitchYaw = 20,
    CloseConnection = 999,
    CloseServer = 1000,
}

impl CallCode {
    pub const ALL: [CallCode; 22] = [
        CallCode::AddBorder,
        CallCode::AddObstacle,
        CallCode::GetPath,
        CallCode::GetWidth,
        CallCode::GetHeight,
        CallCode::GetMaxWeight,
        CallCode::GetMinWeight,
        CallCode::GetMaxWeightInMap,
        CallCode::SetWeight,
        CallCode::GetWeight,
        CallCode::ResetMap,
        CallCode::GetWeights,
        CallCode::GetString,
        CallCode::SetPos,
        CallCode::GetPos,
        CallCode::DebugPrint,
        CallCode::PathTo,
        CallCode::PathToLine,
        CallCode::GetRollPitchYaw,
        CallCode::SetRollPitchYaw,
        CallCode::CloseConnection,
        CallCode::CloseServer,
    ];

    /// Minimum number of argument bytes a request for this call must carry.
    pub const fn min_args_len(self) -> usize {
        match self {
            CallCode::AddBorder => 12,
            CallCode::AddObstacle => 20,
            CallCode::GetPath => 16,
            CallCode::PathToLine => 12,
            CallCode::PathTo => 8,
            CallCode::SetWeight => 12,
            CallCode::GetWeight => 8,
            CallCode::SetPos => 8,
            CallCode::SetRollPitchYaw => 24,
            _ => 0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CallCode::AddBorder => "ADD_BORDER",
            CallCode::AddObstacle => "ADD_OBSTACLE",
            CallCode::GetPath => "GET_PATH",
            CallCode::GetWidth => "GET_WIDTH",
            CallCode::GetHeight => "GET_HEIGHT",
            CallCode::GetMaxWeight => "GET_MAX_WEIGHT",
            CallCode::GetMinWeight => "GET_MIN_WEIGHT",
            CallCode::GetMaxWeightInMap => "GET_MAX_WEIGHT_IN_MAP",
            CallCode::SetWeight => "SET_WEIGHT",
            CallCode::GetWeight => "GET_WEIGHT",
            CallCode::ResetMap => "RESET_MAP",
            CallCode::GetWeights => "GET_WEIGHTS",
            CallCode::GetString => "GET_STRING",
            CallCode::SetPos => "SET_POS",
            CallCode::GetPos => "GET_POS",
            CallCode::DebugPrint => "DEBUG_PRINT",
            CallCode::PathTo => "PATH_TO",
            CallCode::PathToLine => "PATH_TO_LINE",
            CallCode::GetRollPitchYaw => "GET_ROLL_PITCH_YAW",
            CallCode::SetRollPitchYaw => "SET_ROLL_PITCH_YAW",
            CallCode::CloseConnection => "CLOSE_CONNECTION",
            CallCode::CloseServer => "CLOSE_SERVER",
        }
    }
}

impl TryFrom<i32> for CallCode {
    /// The unrecognised header value.
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        CallCode::ALL
            .iter()
            .copied()
            .find(|call| *call as i32 == value)
            .ok_or(value)
    }
}

impl From<CallCode> for i32 {
    fn from(call: CallCode) -> Self {
        call as i32
    }
}

impl fmt::Display for CallCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header of a response frame, or of the acknowledgement a client returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    Failure = 1,
    Continue = 3,
    Acknowledge = 4,
}

impl TryFrom<i32> for Status {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Success),
            1 => Ok(Status::Failure),
            3 => Ok(Status::Continue),
            4 => Ok(Status::Acknowledge),
            other => Err(other),
        }
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status as i32
    }
}
