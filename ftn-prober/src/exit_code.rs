// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Process exit codes: 0 success, 1 operational failure, 2 misuse.

pub const SUCCESS: i32 = 0;
pub const OPERATIONAL_FAILURE: i32 = 1;
pub const MISUSE: i32 = 2;
