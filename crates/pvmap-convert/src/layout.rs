//! Group paths, attribute names and code values of the VMAP tree.

pub const VMAP: &str = "/VMAP";
pub const SYSTEM: &str = "/VMAP/SYSTEM";
pub const UNITSYSTEM: &str = "/VMAP/SYSTEM/UNITSYSTEM";
pub const UNITS: &str = "/VMAP/SYSTEM/UNITS";
pub const ELEMENTTYPES: &str = "/VMAP/SYSTEM/ELEMENTTYPES";
pub const INTEGRATIONTYPES: &str = "/VMAP/SYSTEM/INTEGRATIONTYPES";
pub const COORDINATESYSTEM: &str = "/VMAP/SYSTEM/COORDINATESYSTEM";
pub const MATERIAL: &str = "/VMAP/MATERIAL";
pub const GEOMETRY: &str = "/VMAP/GEOMETRY";
pub const VARIABLES: &str = "/VMAP/VARIABLES";

pub const POINTS: &str = "POINTS";
pub const ELEMENTS: &str = "ELEMENTS";
pub const GEOMETRYSETS: &str = "GEOMETRYSETS";
pub const PARAMETERS: &str = "PARAMETERS";

pub const MYIDENTIFIER: &str = "MYIDENTIFIER";
pub const MYIDENTIFIERS: &str = "MYIDENTIFIERS";
pub const MYNAME: &str = "MYNAME";
pub const MYCOORDINATES: &str = "MYCOORDINATES";
pub const MYCOORDINATESYSTEM: &str = "MYCOORDINATESYSTEM";
pub const MYELEMENTTYPE: &str = "MYELEMENTTYPE";
pub const MYMATERIALTYPE: &str = "MYMATERIALTYPE";
pub const MYCONNECTIVITY: &str = "MYCONNECTIVITY";
pub const MYSETNAME: &str = "MYSETNAME";
pub const MYSETTYPE: &str = "MYSETTYPE";
pub const MYSETINDEXTYPE: &str = "MYSETINDEXTYPE";
pub const MYGEOMETRYSETDATA: &str = "MYGEOMETRYSETDATA";
pub const MYVALUE: &str = "MYVALUE";
pub const MYVALUES: &str = "MYVALUES";
pub const MYDESCRIPTION: &str = "MYDESCRIPTION";
pub const MYGEOMETRYIDS: &str = "MYGEOMETRYIDS";
pub const MYNUMBEROFNODES: &str = "MYNUMBEROFNODES";
pub const MYSHAPETYPE: &str = "MYSHAPETYPE";

pub const SET_TYPE_NODE: i64 = 0;
pub const SET_TYPE_ELEMENT: i64 = 1;
pub const SET_INDEX_SINGLE: i64 = 1;
pub const SET_INDEX_PAIR: i64 = 2;

pub const LOCATION_NODE: i64 = 2;
pub const LOCATION_ELEMENT: i64 = 3;

pub const COORDINATE_CARTESIAN: i64 = 1;
pub const COORDINATE_CYLINDRICAL: i64 = 3;

/// Element coordinate system and material id when none applies.
pub const UNDEFINED: i32 = -1;

pub fn part_path(part: usize) -> String {
    format!("{GEOMETRY}/{part}")
}

pub fn state_path(state: usize) -> String {
    format!("{VARIABLES}/STATE-{state}")
}
